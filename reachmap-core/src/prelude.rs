pub use crate::{ARTIFICIAL_ID_CEILING, UNREACHABLE_COST};

// Re-export key components
pub use crate::config::ReachmapConfig;
pub use crate::error::Error;
pub use crate::heatmap::{Aggregation, HeatmapRequest, HeatmapResult, read_heatmap};
pub use crate::loading::{load_edge_list, load_pois, load_study_areas};
pub use crate::model::{
    BulkCell, BulkPlan, Edge, EdgeList, Mode, OpportunityMatrix, PixelExtent, Poi, Profile,
    RaggedArray, RoutingGraph, StudyArea, TraveltimeMatrix,
};
pub use crate::opportunity::build_opportunity;
pub use crate::pipeline::{Precompute, PrecomputeRequest, PrecomputeSummary};
pub use crate::provider::{
    MemoryNetwork, MemoryPoiSource, NetworkProvider, PoiSource, RawPoi, SnappedStart,
};
pub use crate::storage::MatrixStore;
