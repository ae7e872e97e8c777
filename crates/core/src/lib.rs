pub mod answer;
pub mod error;
pub mod field;
pub mod hlc;
pub mod ids;
pub mod lenient;
pub mod schema;

pub use answer::{Answer, AnswerPatch, AnswerValue, Mutation};
pub use error::CoreError;
pub use field::FieldViewModel;
pub use hlc::Hlc;
pub use ids::*;
pub use schema::{Checklist, Parameter, Zone};
