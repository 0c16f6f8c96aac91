//! Tag dictionaries travel through flat `[key, value, key, value, ...]` rows
//! when they cross a text boundary (CLI arguments, batch parameter files).

use std::collections::BTreeMap;

pub fn tags_to_matrix(tags: &BTreeMap<String, String>) -> Vec<String> {
    let mut matrix = Vec::with_capacity(tags.len() * 2);
    for (key, value) in tags {
        matrix.push(key.clone());
        matrix.push(value.clone());
    }
    matrix
}

/// Inverse of [`tags_to_matrix`]. A trailing cell without a value and rows
/// with an empty key are dropped, not errors.
pub fn tags_from_matrix(matrix: &[String]) -> BTreeMap<String, String> {
    matrix
        .chunks(2)
        .filter(|pair| pair.len() == 2 && !pair[0].is_empty())
        .map(|pair| (pair[0].clone(), pair[1].clone()))
        .collect()
}

/// `key=value` pairs as typed on a command line.
pub fn tags_from_pairs<'a>(pairs: impl IntoIterator<Item = &'a str>) -> BTreeMap<String, String> {
    pairs
        .into_iter()
        .filter_map(|pair| pair.split_once('='))
        .filter(|(key, _)| !key.is_empty())
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn matrix_round_trip() {
        let rows = row(&["proc_int_id", "e42", "upload_id", "u7"]);
        assert_eq!(tags_to_matrix(&tags_from_matrix(&rows)), rows);
    }

    #[test]
    fn odd_and_empty_rows_are_dropped() {
        let tags = tags_from_matrix(&row(&["a", "1", "", "ignored", "b", "2", "dangling"]));
        assert_eq!(tags.len(), 2);
        assert_eq!(tags["a"], "1");
        assert_eq!(tags["b"], "2");
    }

    #[test]
    fn empty_matrix() {
        assert!(tags_from_matrix(&[]).is_empty());
        assert!(tags_to_matrix(&BTreeMap::new()).is_empty());
    }

    #[test]
    fn pairs_from_cli() {
        let tags = tags_from_pairs(["tms_url=https://x", "broken", "=nope", "k=a=b"]);
        assert_eq!(tags.len(), 2);
        assert_eq!(tags["tms_url"], "https://x");
        assert_eq!(tags["k"], "a=b");
    }
}
