//! Role identifiers.
//!
//! A role is identified by `<backend>/roles/<name>`, which is also the
//! logical path it lives at. Parsing splits on the literal `/roles/`
//! separator: the backend is everything before its *first* occurrence and
//! the role name everything after its *last* occurrence. The two only agree
//! when the separator occurs once; `a/roles/b/roles/c` parses to backend
//! `a` and name `c`.

pub const ROLES_SEGMENT: &str = "/roles/";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("no backend found")]
    NoBackend,

    #[error("no name found")]
    NoName,
}

/// Builds the identifier of role `name` under `backend`.
pub fn role_path(backend: &str, name: &str) -> String {
    format!("{}{}{}", backend, ROLES_SEGMENT, name)
}

/// The backend mount path of a role identifier.
pub fn backend_from_path(path: &str) -> Result<&str, PathError> {
    match path.split_once(ROLES_SEGMENT) {
        Some((backend, rest)) if !backend.is_empty() && !rest.is_empty() => Ok(backend),
        _ => Err(PathError::NoBackend),
    }
}

/// The role name of a role identifier.
pub fn role_name_from_path(path: &str) -> Result<&str, PathError> {
    match path.rsplit_once(ROLES_SEGMENT) {
        Some((prefix, name)) if !prefix.is_empty() && !name.is_empty() => Ok(name),
        _ => Err(PathError::NoName),
    }
}
