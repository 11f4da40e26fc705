//! Minimal dotted/array-indexed JSON path support (e.g.
//! `"header.parties[0].name"`), shared by [`crate::store`] (applying
//! corrections) and [`crate::accuracy_guardian`] (reading a rule's
//! target field before proposing a replacement).

enum PathSegment {
    Key(String),
    Index(usize),
}

fn parse_path(path: &str) -> Vec<PathSegment> {
    let mut segments = Vec::new();
    for part in path.split('.') {
        let mut rest = part;
        while let Some(start) = rest.find('[') {
            let key = &rest[..start];
            if !key.is_empty() {
                segments.push(PathSegment::Key(key.to_string()));
            }
            let end = rest[start..].find(']').map(|e| e + start);
            if let Some(end) = end {
                if let Ok(idx) = rest[start + 1..end].parse::<usize>() {
                    segments.push(PathSegment::Index(idx));
                }
                rest = &rest[end + 1..];
            } else {
                break;
            }
        }
        if !rest.is_empty() {
            segments.push(PathSegment::Key(rest.to_string()));
        }
    }
    segments
}

/// Read the value at `path`, or `None` if any segment is missing.
pub fn get_path<'a>(value: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    let mut current = value;
    for segment in parse_path(path) {
        match segment {
            PathSegment::Key(key) => current = current.get(&key)?,
            PathSegment::Index(idx) => current = current.get(idx)?,
        }
    }
    Some(current)
}

/// Overwrite the value at `path`, returning the previous value, or
/// `None` if any segment is missing (the path must already exist; this
/// does not create intermediate objects/arrays).
pub fn set_path(value: &mut serde_json::Value, path: &str, new_value: serde_json::Value) -> Option<serde_json::Value> {
    let segments = parse_path(path);
    set_path_recursive(value, &segments, new_value)
}

fn set_path_recursive(
    value: &mut serde_json::Value,
    segments: &[PathSegment],
    new_value: serde_json::Value,
) -> Option<serde_json::Value> {
    let (first, rest) = segments.split_first()?;
    if rest.is_empty() {
        return match first {
            PathSegment::Key(key) => {
                let obj = value.as_object_mut()?;
                obj.insert(key.clone(), new_value)
            }
            PathSegment::Index(idx) => {
                let arr = value.as_array_mut()?;
                if *idx < arr.len() {
                    Some(std::mem::replace(&mut arr[*idx], new_value))
                } else {
                    None
                }
            }
        };
    }
    let child = match first {
        PathSegment::Key(key) => value.as_object_mut()?.get_mut(key)?,
        PathSegment::Index(idx) => value.as_array_mut()?.get_mut(*idx)?,
    };
    set_path_recursive(child, rest, new_value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_and_set_roundtrip_through_array_index() {
        let mut value = serde_json::json!({"header": {"parties": [{"name": "old"}]}});
        assert_eq!(get_path(&value, "header.parties[0].name"), Some(&serde_json::json!("old")));
        let previous = set_path(&mut value, "header.parties[0].name", serde_json::json!("new"));
        assert_eq!(previous, Some(serde_json::json!("old")));
        assert_eq!(get_path(&value, "header.parties[0].name"), Some(&serde_json::json!("new")));
    }

    #[test]
    fn missing_path_returns_none() {
        let value = serde_json::json!({"header": {}});
        assert_eq!(get_path(&value, "header.missing.deeper"), None);
    }
}
