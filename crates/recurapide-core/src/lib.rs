pub mod error;
pub mod evidence;
pub mod prompt;
pub mod receipt;
pub mod schema;

pub use error::{ErrorKind, PipelineError};
pub use evidence::{Evidence, NormalizedInput, USER_CONTEXT_SEPARATOR, combine, normalize};
pub use prompt::{Message, Role, StructuringInstruction, build_instruction};
pub use receipt::{RawCompletion, StructuredResult, TransactionRecord};
pub use schema::validate_completion;
