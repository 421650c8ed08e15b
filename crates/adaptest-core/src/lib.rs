//! adaptest-core: Computerized Adaptive Testing engine.
//!
//! This crate holds the IRT model, the EAP ability estimator, the
//! maximum-information item selector, the stopping rule, the score
//! transformer and the session state machine that ties them together.
//! Storage and exposure tracking are reached through the traits in
//! [`traits`].

pub mod config;
pub mod engine;
pub mod error;
pub mod estimator;
pub mod irt;
pub(crate) mod locks;
pub mod memory;
pub mod model;
pub mod scoring;
pub mod selector;
pub mod session;
pub mod stopping;
pub mod traits;

pub use config::EngineConfig;
pub use engine::{CatEngine, ResumeOutcome, StartOutcome, StartRequest, SubmitOutcome};
pub use error::CatError;
pub use model::{
    AbilityEstimate, CalibratedItem, ContentArea, IrtParams, ResponseRecord, SessionStatus,
    StopReason, ThetaPoint,
};
pub use scoring::ScoreReport;
pub use session::{CatSession, SessionId};
