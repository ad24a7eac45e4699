pub mod document;

pub use document::{
    Commit, DocumentActor, DocumentArguments, DocumentHandle, DocumentHandleError, DocumentMsg,
    DocumentSnapshot,
};
