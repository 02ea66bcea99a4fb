use super::*;

fn spec() -> ToolSpec {
    ToolSpec {
        key: "hotels".to_string(),
        endpoint: "https://tools.internal/hotels/".to_string(),
    }
}

#[tokio::test]
async fn test_build_binds_key_and_endpoint() {
    let factory = HttpToolConnectionFactory::default();
    let token = AccessToken::expiring_in("abc", Duration::from_secs(600));

    let transport = factory.build(&spec(), &token).await.unwrap();
    assert_eq!(transport.key(), "hotels");
    transport.close().await.unwrap();
}

#[tokio::test]
async fn test_build_rejects_unprintable_token() {
    let factory = HttpToolConnectionFactory::default();
    let token = AccessToken::expiring_in("bad\ntoken", Duration::from_secs(600));

    let err = factory.build(&spec(), &token).await.err().unwrap();
    assert!(matches!(err, Error::Credential(_)));
}

#[test]
fn test_operation_url_joins_cleanly() {
    let transport = HttpToolTransport {
        key: "hotels".to_string(),
        endpoint: "https://tools.internal/hotels".to_string(),
        client: reqwest::Client::new(),
    };
    assert_eq!(
        transport.operation_url("/search"),
        "https://tools.internal/hotels/search"
    );
}
