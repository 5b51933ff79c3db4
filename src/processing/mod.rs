pub mod director;
pub mod error;
pub mod fetcher;
pub mod lifecycle;
pub mod output;
pub mod poller;
pub mod preflight;
pub mod request;

pub use director::{Director, DirectorConfig, RunOutcome};
pub use error::Error;
pub use fetcher::{FetchError, RetryPolicy, RetryingFetcher};
pub use lifecycle::{CheckLifecycleManager, CheckState, TrackedCheck};
pub use output::{extract_output, OUTPUT_SENTINEL};
pub use poller::{PollResult, PollingEngine};
pub use preflight::{PreconditionError, TargetPreflight};
pub use request::{CallerContext, DispatchRequest, DispatchTarget, ReservedInputError};
