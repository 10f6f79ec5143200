//! Parameter-group parser tests
//!
//! Row/field splitting, decoding and typed value coercion.

use ts3query::{ParameterGroup, ParameterGroupList, QueryError};

// =============================================================================
// List Parsing Tests
// =============================================================================

#[test]
fn test_parse_empty_input_yields_empty_list() {
    assert!(ParameterGroupList::parse("").is_empty());
    assert!(ParameterGroupList::parse("   ").is_empty());
}

#[test]
fn test_parse_two_rows() {
    let list = ParameterGroupList::parse("cid=1 pid=0|cid=2 pid=1");
    assert_eq!(list.len(), 2);

    let first = list.get(0).unwrap();
    assert_eq!(first.parameters()[0].name(), "cid");
    assert_eq!(first.parameters()[1].name(), "pid");
    assert_eq!(first.value("cid"), Some("1"));
    assert_eq!(first.value("pid"), Some("0"));

    let second = list.get(1).unwrap();
    assert_eq!(second.value("cid"), Some("2"));
    assert_eq!(second.value("pid"), Some("1"));
}

#[test]
fn test_parse_single_row() {
    let list = ParameterGroupList::parse("clid=7 client_nickname=John\\sDoe");
    assert_eq!(list.len(), 1);
    assert_eq!(list.first().unwrap().value("client_nickname"), Some("John Doe"));
}

#[test]
fn test_parse_decodes_keys_and_values_independently() {
    let group = ParameterGroup::parse("weird\\skey=a\\pb");
    assert_eq!(group.parameters()[0].name(), "weird key");
    assert_eq!(group.parameters()[0].value(), Some("a|b"));
}

#[test]
fn test_parse_bare_keys() {
    let group = ParameterGroup::parse("error id=0");
    assert!(group.has("error"));
    assert_eq!(group.value("error"), None);
    assert_eq!(group.value("id"), Some("0"));
}

#[test]
fn test_parse_tolerates_repeated_spaces() {
    let group = ParameterGroup::parse("a=1  b=2");
    assert_eq!(group.len(), 2);
}

#[test]
fn test_parse_empty_value_is_present_but_empty() {
    let group = ParameterGroup::parse("extra_msg= id=1");
    assert_eq!(group.value("extra_msg"), Some(""));
}

// =============================================================================
// Lookup Tests
// =============================================================================

#[test]
fn test_lookup_is_case_insensitive() {
    let group = ParameterGroup::parse("Cid=5");
    assert_eq!(group.value("cid"), Some("5"));
    assert_eq!(group.value("CID"), Some("5"));
}

#[test]
fn test_lookup_first_match_wins() {
    let group = ParameterGroup::parse("cid=1 cid=2");
    assert_eq!(group.value("cid"), Some("1"));
}

// =============================================================================
// Typed Coercion Tests
// =============================================================================

#[test]
fn test_u32_negative_wire_value_reinterprets_bit_pattern() {
    let group = ParameterGroup::parse("iconid=-1");
    assert_eq!(group.value_of::<u32>("iconid").unwrap(), 4_294_967_295);

    let group = ParameterGroup::parse("iconid=-2147483648");
    assert_eq!(group.value_of::<u32>("iconid").unwrap(), 2_147_483_648);
}

#[test]
fn test_u32_plain_value() {
    let group = ParameterGroup::parse("cid=42");
    assert_eq!(group.value_of::<u32>("cid").unwrap(), 42);
}

#[test]
fn test_u64_negative_wire_value_reinterprets_bit_pattern() {
    let group = ParameterGroup::parse("bytes=-1");
    assert_eq!(group.value_of::<u64>("bytes").unwrap(), u64::MAX);
}

#[test]
fn test_bool_accepts_zero_and_one() {
    let group = ParameterGroup::parse("muted=1 talking=0");
    assert!(group.value_of::<bool>("muted").unwrap());
    assert!(!group.value_of::<bool>("talking").unwrap());
}

#[test]
fn test_bool_rejects_other_text() {
    let group = ParameterGroup::parse("muted=yes");
    assert!(matches!(
        group.value_of::<bool>("muted"),
        Err(QueryError::Parse { .. })
    ));
}

#[test]
fn test_missing_required_value_is_an_error() {
    let group = ParameterGroup::parse("cid=1");
    assert!(matches!(
        group.value_of::<u32>("pid"),
        Err(QueryError::Parse { .. })
    ));

    // A bare key counts as missing for a required target
    let group = ParameterGroup::parse("flag");
    assert!(matches!(
        group.value_of::<u32>("flag"),
        Err(QueryError::Parse { .. })
    ));
}

#[test]
fn test_optional_value_absent_is_none() {
    let group = ParameterGroup::parse("cid=1");
    assert_eq!(group.value_of_opt::<u32>("pid").unwrap(), None);
    assert_eq!(group.value_of_opt::<u32>("cid").unwrap(), Some(1));
}

#[test]
fn test_optional_value_present_but_malformed_is_an_error() {
    let group = ParameterGroup::parse("pid=abc");
    assert!(group.value_of_opt::<u32>("pid").is_err());
}

#[test]
fn test_string_values_keep_decoded_text() {
    let group = ParameterGroup::parse("msg=invalid\\sresult\\sset");
    assert_eq!(
        group.value_of::<String>("msg").unwrap(),
        "invalid result set"
    );
}
