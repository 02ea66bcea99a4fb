use super::*;

#[test]
fn test_parse_token_response() {
    let issued = Utc::now();
    let token = parse_token_response(
        r#"{"access_token":"abc123","token_type":"Bearer","expires_in":1800}"#,
        issued,
    )
    .unwrap();

    assert_eq!(token.secret(), "abc123");
    assert_eq!(token.expires_at(), issued + chrono::Duration::seconds(1800));
}

#[test]
fn test_parse_defaults_expiry() {
    let issued = Utc::now();
    let token = parse_token_response(r#"{"access_token":"abc"}"#, issued).unwrap();
    assert_eq!(token.expires_at(), issued + chrono::Duration::seconds(3600));
}

#[test]
fn test_parse_rejects_missing_token() {
    let err = parse_token_response(r#"{"error":"invalid_client"}"#, Utc::now()).unwrap_err();
    assert!(matches!(err, Error::Credential(_)));

    let err = parse_token_response("<html>", Utc::now()).unwrap_err();
    assert!(matches!(err, Error::Credential(_)));
}
