// Unit tests for generated script names

use crate::script_name::ScriptName;

/// **VALUE**: Verifies the `adjective-noun-NNNN` shape of generated names.
///
/// **WHY THIS MATTERS**: Names show up in every log line about a worker; they
/// must be readable and must never echo the worker's token.
///
/// **BUG THIS CATCHES**: Would catch an unpadded suffix or a missing segment.
#[test]
fn given_generated_name_when_split_then_three_readable_parts() {
    for _ in 0..50 {
        // GIVEN/WHEN: A fresh name
        let name = ScriptName::generate();
        let parts: Vec<&str> = name.as_str().split('-').collect();

        // THEN: Three segments, last one four digits
        assert_eq!(parts.len(), 3, "Unexpected name: {name}");
        assert!(parts[0].chars().all(|c| c.is_ascii_lowercase()));
        assert!(parts[1].chars().all(|c| c.is_ascii_lowercase()));
        assert_eq!(parts[2].len(), 4);
        assert!(parts[2].chars().all(|c| c.is_ascii_digit()));
    }
}
