//! SIWE-style challenge message construction.
//!
//! The backend verifies the wallet signature against this exact text, so the
//! rendering must be byte-identical to the agreed line order. All fields come
//! from the server challenge; the client adds nothing.

use std::fmt;

use keybridge_core::WalletChallenge;

/// A structured plain-text sign-in message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiweMessage {
    pub domain: String,
    pub address: String,
    pub statement: String,
    pub uri: String,
    pub version: String,
    pub chain_id: u64,
    pub nonce: String,
    pub issued_at: String,
}

impl From<&WalletChallenge> for SiweMessage {
    fn from(challenge: &WalletChallenge) -> Self {
        Self {
            domain: challenge.domain.clone(),
            address: challenge.address.clone(),
            statement: challenge.statement.clone(),
            uri: challenge.uri.clone(),
            version: challenge.version.clone(),
            chain_id: challenge.chain_id,
            nonce: challenge.nonce.clone(),
            issued_at: challenge.issued_at.clone(),
        }
    }
}

impl fmt::Display for SiweMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Line order is fixed; the signature is verified against these bytes.
        write!(
            f,
            "{domain} wants you to sign in with your Ethereum account:\n\
             {address}\n\
             \n\
             {statement}\n\
             \n\
             URI: {uri}\n\
             Version: {version}\n\
             Chain ID: {chain_id}\n\
             Nonce: {nonce}\n\
             Issued At: {issued_at}",
            domain = self.domain,
            address = self.address,
            statement = self.statement,
            uri = self.uri,
            version = self.version,
            chain_id = self.chain_id,
            nonce = self.nonce,
            issued_at = self.issued_at,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SiweMessage {
        SiweMessage {
            domain: "app.example.com".into(),
            address: "0xAb5801a7D398351b8bE11C439e05C5B3259aeC9B".into(),
            statement: "Sign in to Example".into(),
            uri: "https://app.example.com".into(),
            version: "1".into(),
            chain_id: 1,
            nonce: "32891756".into(),
            issued_at: "2021-09-30T16:25:24Z".into(),
        }
    }

    #[test]
    fn renders_exact_line_order() {
        let expected = "app.example.com wants you to sign in with your Ethereum account:\n\
                        0xAb5801a7D398351b8bE11C439e05C5B3259aeC9B\n\
                        \n\
                        Sign in to Example\n\
                        \n\
                        URI: https://app.example.com\n\
                        Version: 1\n\
                        Chain ID: 1\n\
                        Nonce: 32891756\n\
                        Issued At: 2021-09-30T16:25:24Z";
        assert_eq!(sample().to_string(), expected);
    }

    #[test]
    fn rendering_is_deterministic() {
        let message = sample();
        let first = message.to_string();
        for _ in 0..10 {
            assert_eq!(message.to_string(), first);
        }
    }

    #[test]
    fn distinct_challenges_differ_only_in_changed_fields() {
        let base = sample().to_string();

        let mut changed = sample();
        changed.nonce = "99999999".into();
        let rendered = changed.to_string();

        assert_ne!(rendered, base);
        assert_eq!(rendered.replace("99999999", "32891756"), base);
    }

    #[test]
    fn builds_from_server_challenge() {
        let challenge: WalletChallenge = serde_json::from_value(serde_json::json!({
            "domain": "app.example.com",
            "address": "0xabc",
            "statement": "Sign in",
            "uri": "https://app.example.com",
            "version": "1",
            "chain_id": 10,
            "nonce": "n-1",
            "issued_at": "2024-01-01T00:00:00Z",
        }))
        .unwrap();
        let message = SiweMessage::from(&challenge);
        assert_eq!(message.chain_id, 10);
        assert!(message.to_string().starts_with("app.example.com wants you"));
        assert!(message.to_string().contains("\nChain ID: 10\n"));
    }
}
