//! StatusList2021 credential envelope and its JWS proof.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sla_crypto::jws::{self, JwsHeader};
use sla_crypto::{SigningKey, VerifyingKey};
use sla_types::StatusPurpose;

use crate::document::StatusListDocument;
use crate::error::{StatusListError, StatusListResult};

pub const CREDENTIALS_V1_CONTEXT: &str = "https://www.w3.org/2018/credentials/v1";
pub const STATUS_LIST_2021_CONTEXT: &str = "https://w3id.org/vc/status-list/2021/v1";
pub const PROOF_TYPE_JWS_2020: &str = "JsonWebSignature2020";

/// Credential projection of a status list, before signing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsignedCredential {
    #[serde(rename = "@context")]
    pub context: Vec<String>,
    pub id: String,
    #[serde(rename = "type")]
    pub types: Vec<String>,
    pub issuer: String,
    #[serde(with = "sla_types::temporal::canonical")]
    pub issuance_date: DateTime<Utc>,
    pub credential_subject: CredentialSubject,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialSubject {
    /// Same as the document id.
    pub id: String,
    #[serde(rename = "type")]
    pub subject_type: String,
    pub status_purpose: StatusPurpose,
    pub encoded_list: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    #[serde(rename = "type")]
    pub proof_type: String,
    pub jws: String,
}

/// A credential with its proof attached.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedCredential {
    #[serde(flatten)]
    pub credential: UnsignedCredential,
    pub proof: Proof,
}

impl StatusListDocument {
    /// Project into a StatusList2021 credential. `issuanceDate` is the
    /// document's `updatedAt`, so the projection is pure.
    pub fn to_credential(&self, credential_id: impl Into<String>) -> UnsignedCredential {
        UnsignedCredential {
            context: vec![
                CREDENTIALS_V1_CONTEXT.to_string(),
                STATUS_LIST_2021_CONTEXT.to_string(),
            ],
            id: credential_id.into(),
            types: vec![
                "VerifiableCredential".to_string(),
                "StatusList2021Credential".to_string(),
            ],
            issuer: self.issuer.clone(),
            issuance_date: self.updated_at,
            credential_subject: CredentialSubject {
                id: self.id.clone(),
                subject_type: "StatusList2021".to_string(),
                status_purpose: self.status_purpose,
                encoded_list: self.encoded_list.clone(),
            },
        }
    }
}

/// Signing capability for credentials.
///
/// Implementations must be deterministic for identical credential content
/// and key material.
pub trait CredentialSigner: Send + Sync {
    fn sign(&self, credential: &UnsignedCredential) -> StatusListResult<Proof>;

    fn sign_credential(&self, credential: UnsignedCredential) -> StatusListResult<SignedCredential> {
        let proof = self.sign(&credential)?;
        Ok(SignedCredential { credential, proof })
    }
}

/// JWT claims carried in the proof JWS.
#[derive(Debug, Serialize, Deserialize)]
struct CredentialClaims {
    vc: UnsignedCredential,
    iss: String,
    jti: String,
    iat: i64,
}

impl CredentialClaims {
    fn for_credential(credential: &UnsignedCredential) -> Self {
        Self {
            vc: credential.clone(),
            iss: credential.issuer.clone(),
            jti: credential.id.clone(),
            iat: credential.issuance_date.timestamp(),
        }
    }
}

/// Ed25519 compact-JWS signer producing `JsonWebSignature2020` proofs.
pub struct Ed25519JwsSigner {
    key: SigningKey,
    kid: String,
}

impl Ed25519JwsSigner {
    pub fn new(key: SigningKey, kid: impl Into<String>) -> Self {
        Self {
            key,
            kid: kid.into(),
        }
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }
}

impl CredentialSigner for Ed25519JwsSigner {
    fn sign(&self, credential: &UnsignedCredential) -> StatusListResult<Proof> {
        let header = JwsHeader::eddsa(self.kid.clone());
        let token = jws::sign(&header, &CredentialClaims::for_credential(credential), &self.key)
            .map_err(|e| StatusListError::Signing(e.to_string()))?;
        Ok(Proof {
            proof_type: PROOF_TYPE_JWS_2020.to_string(),
            jws: token,
        })
    }
}

/// Check a signed credential's proof against `key`, and that the signed
/// claims describe exactly the attached credential.
pub fn verify_credential(signed: &SignedCredential, key: &VerifyingKey) -> StatusListResult<()> {
    if signed.proof.proof_type != PROOF_TYPE_JWS_2020 {
        return Err(StatusListError::Signing(format!(
            "unsupported proof type {}",
            signed.proof.proof_type
        )));
    }
    let (_, claims): (JwsHeader, CredentialClaims) = jws::verify(&signed.proof.jws, key)
        .map_err(|e| StatusListError::Signing(e.to_string()))?;

    if claims.vc != signed.credential {
        return Err(StatusListError::Signing(
            "signed claims do not match credential".into(),
        ));
    }
    if claims.iss != signed.credential.issuer || claims.jti != signed.credential.id {
        return Err(StatusListError::Signing("issuer or id claim mismatch".into()));
    }
    Ok(())
}
