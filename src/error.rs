use core::fmt;
use grid_util::Point;
use thiserror::Error;

/// Why a start or goal position was rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EndpointFault {
    OutOfBounds,
    Obstacle,
}

impl fmt::Display for EndpointFault {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EndpointFault::OutOfBounds => write!(f, "lies outside the grid"),
            EndpointFault::Obstacle => write!(f, "is blocked by an obstacle"),
        }
    }
}

/// Errors returned by the planners. An unreachable goal is not an error: it is reported as an
/// empty path or a `false` success flag.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("endpoint {point} {fault}")]
    InvalidEndpoint { point: Point, fault: EndpointFault },

    #[error("search stopped after {limit} expansions without reaching a result")]
    BudgetExhausted { limit: usize },

    #[error("the incremental planner has not been initialized")]
    NotInitialized,
}

/// Returned when extracting the minimum of an empty [IndexedHeap](crate::node_heap::IndexedHeap).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("extract-min called on an empty queue")]
pub struct EmptyQueueError;
