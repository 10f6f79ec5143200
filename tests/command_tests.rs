//! Command model tests
//!
//! Construction validation and wire serialization.

use ts3query::{Command, Parameter, QueryError};

// =============================================================================
// Parameter Tests
// =============================================================================

#[test]
fn test_parameter_name_must_not_be_empty() {
    assert!(matches!(
        Parameter::new("", "value"),
        Err(QueryError::InvalidArgument(_))
    ));
    assert!(matches!(
        Parameter::new("   ", "value"),
        Err(QueryError::InvalidArgument(_))
    ));
}

#[test]
fn test_parameter_trims_name_and_value() {
    let parameter = Parameter::new(" sid ", " 1 ").unwrap();
    assert_eq!(parameter.name(), "sid");
    assert_eq!(parameter.value(), Some("1"));
}

#[test]
fn test_flag_parameter_has_no_value() {
    let parameter = Parameter::flag("-uid").unwrap();
    assert_eq!(parameter.name(), "-uid");
    assert_eq!(parameter.value(), None);
}

// =============================================================================
// Command Tests
// =============================================================================

#[test]
fn test_command_name_validation() {
    assert!(matches!(
        Command::new(""),
        Err(QueryError::InvalidArgument(_))
    ));
    assert!(matches!(
        Command::new("two words"),
        Err(QueryError::InvalidArgument(_))
    ));
    assert!(Command::new("whoami").is_ok());
}

#[test]
fn test_serialize_bare_command() {
    let command = Command::new("whoami").unwrap();
    assert_eq!(command.serialize(), "whoami");
}

#[test]
fn test_serialize_with_parameters() {
    let command = Command::new("use")
        .unwrap()
        .arg("sid", 1)
        .unwrap()
        .switch("-virtual")
        .unwrap();
    assert_eq!(command.serialize(), "use sid=1 -virtual");
}

#[test]
fn test_serialize_escapes_values() {
    let command = Command::new("login")
        .unwrap()
        .arg("client_login_name", "server admin")
        .unwrap()
        .arg("client_login_password", "p|pe\\slash")
        .unwrap();
    assert_eq!(
        command.serialize(),
        "login client_login_name=server\\sadmin client_login_password=p\\ppe\\\\slash"
    );
}

#[test]
fn test_serialize_preserves_parameter_order() {
    let command = Command::new("channelcreate")
        .unwrap()
        .arg("channel_name", "Lobby")
        .unwrap()
        .arg("channel_flag_permanent", 1)
        .unwrap()
        .arg("cpid", 0)
        .unwrap();
    assert_eq!(
        command.serialize(),
        "channelcreate channel_name=Lobby channel_flag_permanent=1 cpid=0"
    );
}

#[test]
fn test_encoded_flag_goes_through_the_codec() {
    let command = Command::new("dummy")
        .unwrap()
        .parameter(Parameter::encoded_flag("odd flag").unwrap());
    assert_eq!(command.serialize(), "dummy odd\\sflag");
}
