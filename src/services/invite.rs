//! Invite lifecycle: issue, sign, verify, redeem.
//!
//! An invite is a UUIDv4 persisted with its subject; the redemption URL
//! carries the UUID plus an HMAC-SHA256 signature over the invite's identity.
//! Single-use is enforced by the storage transaction, not the signature -- the
//! signature only rejects forged or mangled links early.

use std::sync::OnceLock;

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use ring::{constant_time, hmac};
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::{ChatKind, Invite, SubjectKind};
use crate::errors::ErrorKind;
use crate::storage::{InviteRepository, RedeemedSubject, SharedStorage, StorageError};

use super::ServiceError;

fn invite_param_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"invite=([0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12})")
            .expect("invite regex")
    })
}

fn bare_uuid_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b([0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12})\b")
            .expect("uuid regex")
    })
}

fn sig_param_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"sig=([0-9a-fA-F]+)").expect("sig regex"))
}

/// An invite token extracted from a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InviteToken {
    /// The invite UUID.
    pub invite_id: Uuid,
    /// Accompanying signature, when the message carried one.
    pub signature: Option<String>,
}

/// Signed one-time invite management.
pub struct InviteService {
    storage: SharedStorage,
    key: hmac::Key,
    ttl: Duration,
    link_base: String,
}

impl std::fmt::Debug for InviteService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InviteService")
            .field("ttl_hours", &self.ttl.num_hours())
            .field("link_base", &self.link_base)
            .finish_non_exhaustive()
    }
}

impl InviteService {
    /// Create the service with the signing secret and TTL.
    pub fn new(storage: SharedStorage, secret: &[u8], ttl_hours: i64, link_base: String) -> Self {
        Self {
            storage,
            key: hmac::Key::new(hmac::HMAC_SHA256, secret),
            ttl: Duration::hours(ttl_hours),
            link_base,
        }
    }

    /// Build (but do not persist) an invite for a pending subject.
    pub fn build_invite(
        &self,
        team_id: &str,
        chat_kind: ChatKind,
        subject_kind: SubjectKind,
        subject_id: &str,
        issued_by: &str,
        now: DateTime<Utc>,
    ) -> Invite {
        Invite {
            invite_id: Uuid::new_v4(),
            team_id: team_id.to_owned(),
            chat_kind,
            subject_kind,
            subject_id: subject_id.to_owned(),
            issued_by: issued_by.to_owned(),
            issued_at: now,
            expires_at: now + self.ttl,
            used_at: None,
        }
    }

    /// The opaque redemption URL handed back to the issuing admin.
    pub fn redemption_url(&self, invite: &Invite, chat_id: &str) -> String {
        format!(
            "{}?invite={}&type={}&chat={}&team={}&sig={}",
            self.link_base,
            invite.invite_id,
            invite.subject_kind,
            chat_id,
            invite.team_id,
            self.sign(invite),
        )
    }

    fn signing_payload(invite: &Invite) -> String {
        format!(
            "{}|{}|{}",
            invite.invite_id, invite.team_id, invite.chat_kind
        )
    }

    /// Hex keeps the signature stable through the plain-text sanitizer
    /// (base64url alphabets carry markdown-significant characters).
    fn sign(&self, invite: &Invite) -> String {
        let tag = hmac::sign(&self.key, Self::signing_payload(invite).as_bytes());
        tag.as_ref().iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Verify a URL signature against the persisted invite.
    pub fn verify_signature(&self, invite: &Invite, signature: &str) -> bool {
        let expected = self.sign(invite);
        constant_time::verify_slices_are_equal(
            expected.as_bytes(),
            signature.to_lowercase().as_bytes(),
        )
        .is_ok()
    }

    /// Extract an invite token from free message text: either an
    /// `invite=<uuid>` query fragment (with optional `sig=`) or a bare UUID.
    pub fn extract_token(text: &str) -> Option<InviteToken> {
        let captured = invite_param_re()
            .captures(text)
            .or_else(|| bare_uuid_re().captures(text))?;
        let invite_id = Uuid::parse_str(captured.get(1)?.as_str()).ok()?;
        let signature = sig_param_re()
            .captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_owned());
        Some(InviteToken {
            invite_id,
            signature,
        })
    }

    /// Outstanding invites for a team.
    pub async fn pending(&self, team_id: &str) -> Result<Vec<Invite>, ServiceError> {
        Ok(self.storage.pending_invites(team_id, Utc::now()).await?)
    }

    /// Redeem a token presented by `telegram_id` in the given chat.
    ///
    /// Rejects missing, foreign-chat, forged, expired, and already-used
    /// invites; otherwise atomically binds the subject and marks the invite
    /// used. Exactly one concurrent redemption of the same token wins.
    ///
    /// # Errors
    ///
    /// [`ServiceError`] with the matching taxonomy kind for each rejection.
    pub async fn redeem(
        &self,
        token: &InviteToken,
        telegram_id: i64,
        team_id: &str,
        chat_kind: ChatKind,
        now: DateTime<Utc>,
    ) -> Result<RedeemedSubject, ServiceError> {
        let invite = self
            .storage
            .invite(token.invite_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("This invite does not exist."))?;

        if invite.team_id != team_id || invite.chat_kind != chat_kind {
            debug!(invite_id = %invite.invite_id, "invite presented in wrong chat");
            return Err(ServiceError::invalid_input(format!(
                "This invite is for the {} of another team or chat.",
                invite.chat_kind.display_name()
            )));
        }

        if let Some(signature) = token.signature.as_deref() {
            if !self.verify_signature(&invite, signature) {
                return Err(ServiceError::new(
                    ErrorKind::Denied,
                    "This invite link is not valid.",
                ));
            }
        }

        if invite.is_expired(now) {
            return Err(ServiceError::new(
                ErrorKind::InviteExpired,
                "This invite has expired. Ask a team admin for a new one.",
            ));
        }

        if invite.is_used() {
            return Err(ServiceError::new(
                ErrorKind::InviteAlreadyUsed,
                "Invite already used.",
            ));
        }

        let redeemed = self
            .storage
            .redeem_invite(invite.invite_id, telegram_id, now)
            .await
            .map_err(|e| match e {
                // A concurrent redemption won the conditional update.
                StorageError::Conflict(_) => {
                    ServiceError::new(ErrorKind::InviteAlreadyUsed, "Invite already used.")
                }
                other => ServiceError::from(other),
            })?;

        info!(
            invite_id = %invite.invite_id,
            team_id,
            subject = %redeemed.subject_id,
            "invite redeemed"
        );
        Ok(redeemed)
    }
}
