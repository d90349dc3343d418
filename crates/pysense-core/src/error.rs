//! Error types for building, resolution and inference

use crate::tree::Location;
use std::path::PathBuf;
use thiserror::Error;

/// Failure to turn source text (or a file) into a module
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("unable to load module `{modname}` from {}: {source}", path.display())]
    Io {
        modname: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("module `{modname}` declares unknown encoding `{encoding}`")]
    Encoding { modname: String, encoding: String },

    #[error("module `{modname}` is not valid {encoding}")]
    Decode { modname: String, encoding: String },

    #[error("syntax error in module `{modname}` ({path}) at {location}: {message}")]
    Syntax {
        modname: String,
        path: String,
        location: Location,
        message: String,
    },
}

impl BuildError {
    pub fn modname(&self) -> &str {
        match self {
            BuildError::Io { modname, .. }
            | BuildError::Encoding { modname, .. }
            | BuildError::Decode { modname, .. }
            | BuildError::Syntax { modname, .. } => modname,
        }
    }
}

/// Failure to map a dotted module name to a file. Cached, hence `Clone`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("no module named `{modname}`")]
    NotFound { modname: String, searched: Vec<PathBuf> },

    #[error("invalid module name `{modname}`")]
    InvalidName { modname: String },
}

impl ResolutionError {
    pub fn modname(&self) -> &str {
        match self {
            ResolutionError::NotFound { modname, .. } | ResolutionError::InvalidName { modname } => modname,
        }
    }
}

/// Failure to obtain a module by name
#[derive(Debug, Error)]
pub enum ImportError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error("relative import beyond top-level package from `{from}`")]
    BeyondTopLevel { from: String },
}

impl ImportError {
    pub fn modname(&self) -> &str {
        match self {
            ImportError::Resolution(e) => e.modname(),
            ImportError::Build(e) => e.modname(),
            ImportError::BeyondTopLevel { from } => from,
        }
    }
}

/// Failure attached to one inference step. Travels inside result streams.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InferenceError {
    #[error("name `{name}` is not defined ({location})")]
    NameNotFound { name: String, location: String },

    #[error("`{owner}` has no attribute `{attr}`")]
    AttributeNotFound { owner: String, attr: String },

    #[error("callee of call at {location} could not be inferred")]
    UninferableCallee { location: String },

    #[error("`{value}` is not callable")]
    NotCallable { value: String },

    #[error("failed to import `{modname}`: {message}")]
    Import { modname: String, message: String },

    #[error("introspected member `{name}` has unknown shape")]
    UnknownNode { name: String },

    #[error("{kind} nodes have no value")]
    NotInferable { kind: &'static str },

    #[error("no single value could be inferred for {node}")]
    NoValue { node: String },

    #[error("subscript failed: {message}")]
    Subscript { message: String },

    #[error("`{name}` in `{modname}` is not a class")]
    NotAClass { modname: String, name: String },
}

impl From<ImportError> for InferenceError {
    fn from(err: ImportError) -> Self {
        InferenceError::Import {
            modname: err.modname().to_string(),
            message: err.to_string(),
        }
    }
}

/// Why a method resolution order could not be linearized
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MroError {
    #[error("duplicate bases in class `{class}`")]
    DuplicateBases { class: String },

    #[error("cannot create a consistent method resolution order for `{class}`")]
    Inconsistent { class: String },

    #[error("class `{class}` inherits from itself")]
    Cycle { class: String },

    #[error("class `{class}` has bases that are not classes")]
    UnknownBases { class: String },
}

/// A subtype question that has no definite answer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotDecidable {
    #[error("`{0}` is not a class")]
    NotAClass(String),

    #[error("class `{0}` has unknown bases")]
    UnknownBases(String),

    #[error(transparent)]
    Mro(#[from] MroError),
}

/// Failure of the length helper
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LenError {
    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error("self-referential __len__ at {location}")]
    RecursionHazard { location: String },

    #[error("object of type `{type_name}` has no len()")]
    NoLen { type_name: String },

    #[error("'{type_name}' object cannot be interpreted as an integer")]
    NotAnInteger { type_name: String },

    #[error("__len__() should return >= 0, got {value}")]
    Negative { value: i64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_error_into_inference_error() {
        let err = ImportError::Resolution(ResolutionError::NotFound {
            modname: "missing".to_string(),
            searched: vec![],
        });
        let inference: InferenceError = err.into();
        assert_eq!(
            inference,
            InferenceError::Import {
                modname: "missing".to_string(),
                message: "no module named `missing`".to_string(),
            }
        );
    }

    #[test]
    fn test_len_error_messages() {
        let err = LenError::NoLen {
            type_name: "int".to_string(),
        };
        assert_eq!(err.to_string(), "object of type `int` has no len()");
        let err = LenError::NotAnInteger {
            type_name: "str".to_string(),
        };
        assert_eq!(err.to_string(), "'str' object cannot be interpreted as an integer");
        assert_eq!(LenError::Negative { value: -2 }.to_string(), "__len__() should return >= 0, got -2");
    }
}
