//! Resolution of HD path templates into concrete derivation paths.
//!
//! A template looks like `m/44'/60'/0'/0/x`: segments are separated by `/`, a trailing `'`
//! marks a hardened index and the segment containing `x` is replaced by the account index.
//! Templates without `x` get the account index appended as last segment.

use crate::consts::{HARDENED_OFFSET, MAX_PATH_DEPTH, PATH_PLACEHOLDER};
use crate::{Error, Result};

/// Return the path indices of `template` where the placeholder is replaced by `insertion_index`.
pub fn resolve(template: &str, insertion_index: u32) -> Result<Vec<u32>> {
    let mut indices = Vec::new();
    let mut used_placeholder = false;

    for segment in segments(template)? {
        let (body, hardened) = match segment.strip_suffix('\'') {
            Some(body) => (body, true),
            None => (segment, false),
        };
        let index = if body.contains(PATH_PLACEHOLDER) {
            used_placeholder = true;
            insertion_index
        } else {
            body.parse::<u32>().map_err(|_| {
                Error::invalid_path(template, format!("'{segment}' is not a valid index"))
            })?
        };
        if hardened {
            if index >= HARDENED_OFFSET {
                return Err(Error::invalid_path(
                    template,
                    format!("'{segment}' is too large to be hardened"),
                ));
            }
            indices.push(index + HARDENED_OFFSET);
        } else {
            indices.push(index);
        }
    }

    if !used_placeholder {
        indices.push(insertion_index);
    }

    if indices.len() > MAX_PATH_DEPTH {
        return Err(Error::invalid_path(
            template,
            format!("only HD paths with up to {MAX_PATH_DEPTH} indices are allowed"),
        ));
    }
    Ok(indices)
}

/// True if the placeholder appears in a segment other than the last one.
///
/// The device can only iterate over the last index of a path, addresses at such templates must
/// be requested one at a time.
pub fn has_internal_variable_index(template: &str) -> bool {
    let Ok(segments) = segments(template) else {
        return false;
    };
    match segments.split_last() {
        Some((_, init)) => init.iter().any(|s| s.contains(PATH_PLACEHOLDER)),
        None => false,
    }
}

/// Validate a template resolving it at index 0.
pub fn validate(template: &str) -> Result<()> {
    resolve(template, 0).map(|_| ())
}

fn segments(template: &str) -> Result<Vec<&str>> {
    let mut parts = template.split('/');
    match parts.next() {
        Some("m") | Some("M") => (),
        _ => return Err(Error::invalid_path(template, "must start with 'm'")),
    }
    let segments: Vec<&str> = parts.collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(Error::invalid_path(template, "empty segment"));
    }
    Ok(segments)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::consts::STANDARD_HD_PATH;

    const H: u32 = HARDENED_OFFSET;

    #[test]
    fn resolve_standard() {
        assert_eq!(
            resolve(STANDARD_HD_PATH, 0).unwrap(),
            vec![H + 44, H + 60, H, 0, 0]
        );
        assert_eq!(
            resolve(STANDARD_HD_PATH, 7).unwrap(),
            vec![H + 44, H + 60, H, 0, 7]
        );
    }

    #[test]
    fn resolve_hardened_placeholder() {
        // Ledger Live style
        assert_eq!(
            resolve("m/44'/60'/x'/0/0", 3).unwrap(),
            vec![H + 44, H + 60, H + 3, 0, 0]
        );
    }

    #[test]
    fn resolve_appends_index() {
        assert_eq!(
            resolve("m/44'/60'/0'", 2).unwrap(),
            vec![H + 44, H + 60, H, 2]
        );
        assert_eq!(resolve("m", 9).unwrap(), vec![9]);
    }

    #[test]
    fn resolve_too_long() {
        let err = resolve("m/44'/60'/0'/0/0", 0).unwrap_err();
        assert!(matches!(err, Error::InvalidPath { .. }));
        assert!(resolve("m/44'/60'/0'/0/0/x", 0).is_err());
        for template in ["m/1/2/3/4", "m/1/2/3/x", "m/1/x/3/4/5"] {
            assert!(resolve(template, 1).unwrap().len() <= MAX_PATH_DEPTH);
        }
    }

    #[test]
    fn resolve_invalid() {
        assert!(resolve("44'/60'/0'/0/x", 0).is_err());
        assert!(resolve("m/44'//0'/x", 0).is_err());
        assert!(resolve("m/44'/abc/x", 0).is_err());
        assert!(resolve("m/2147483648'/x", 0).is_err());
        assert!(resolve("m/44'/x'", H).is_err());
    }

    #[test]
    fn internal_variable_index() {
        assert!(has_internal_variable_index("m/44'/60'/x'/0/0"));
        assert!(!has_internal_variable_index("m/44'/60'/0'/0/x"));
        assert!(!has_internal_variable_index("m/44'/60'/0'"));
        assert!(!has_internal_variable_index("m"));
        assert!(validate(STANDARD_HD_PATH).is_ok());
    }
}
