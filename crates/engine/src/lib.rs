pub mod cache;
pub mod config;
pub mod confirm;
pub mod dispatch;
pub mod error;
pub mod navigation;
pub mod normalize;
pub mod pest;
pub mod remote;
pub mod session;
pub mod tmc;
pub mod transform;
pub mod visibility;

pub use cache::{CacheLoad, ParameterCache};
pub use config::EngineConfig;
pub use confirm::{Confirmation, Confirmer, DismissAll, PendingConfirmation, Prompt, Resolution};
pub use dispatch::{Backoff, Dispatcher, FlushReport, SharedStorage, shared};
pub use error::EngineError;
pub use navigation::{ScreenSequence, StaticSequence, Step, TabBounds, Transition, ZoneEntry};
pub use remote::{ChecklistRemote, HttpRemote, RemoteError};
pub use session::{ChecklistSession, CommitOutcome, SessionDeps};
pub use transform::{transform, transform_parameter};
pub use visibility::{Evaluation, ValidityMap, ValidityRules};
