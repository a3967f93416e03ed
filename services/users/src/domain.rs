// Domain layer modules
pub mod alternate_key;
pub mod user_record;
pub mod user_validator;

// Re-exports
pub use alternate_key::AlternateKey;
pub use user_record::{
    project_public, CreateUserInput, MalformedRecordError, PublicUserRecord, UpdateUserInput,
    UserRecord,
};
pub use user_validator::{UserInputValidator, ValidationError};
