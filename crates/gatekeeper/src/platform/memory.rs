//! In-memory platform adapter.
//!
//! Backs the console surface in the binary and every test that needs a
//! platform without a live chat connection. Fault injection toggles let
//! tests exercise the best-effort paths.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use gatekeeper_common::{ChannelId, Notice, RoleId, UserId};

use super::{Capability, ChatPlatform, PlatformError};

/// Where a recorded notice was delivered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Dm(UserId),
    Channel(ChannelId),
}

#[derive(Default)]
struct Inner {
    /// role -> rank
    roles: HashMap<RoleId, u32>,
    /// member -> held roles; absence means the user left or was kicked
    members: HashMap<UserId, HashSet<RoleId>>,
    bot_rank: u32,
    bot_caps: HashSet<Capability>,
    sent: Vec<(Delivery, Notice)>,
    kicked: Vec<UserId>,
    fail_dm: bool,
    fail_channel: bool,
    fail_grant: bool,
    fail_kick: bool,
}

/// A fully in-process [`ChatPlatform`]
#[derive(Default)]
pub struct MemoryPlatform {
    inner: Mutex<Inner>,
    /// Render notices to stdout (console surface); off in tests
    render: bool,
}

impl MemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Console variant that prints every delivered notice
    pub fn rendering() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            render: true,
        }
    }

    pub fn define_role(&self, role: RoleId, rank: u32) {
        self.inner.lock().unwrap().roles.insert(role, rank);
    }

    pub fn join(&self, user: UserId) {
        self.inner.lock().unwrap().members.entry(user).or_default();
    }

    pub fn set_bot_rank(&self, rank: u32) {
        self.inner.lock().unwrap().bot_rank = rank;
    }

    pub fn allow(&self, cap: Capability) {
        self.inner.lock().unwrap().bot_caps.insert(cap);
    }

    #[cfg(test)]
    pub fn deny(&self, cap: Capability) {
        self.inner.lock().unwrap().bot_caps.remove(&cap);
    }

    #[cfg(test)]
    pub fn fail_dms(&self, fail: bool) {
        self.inner.lock().unwrap().fail_dm = fail;
    }

    #[cfg(test)]
    pub fn fail_channel_sends(&self, fail: bool) {
        self.inner.lock().unwrap().fail_channel = fail;
    }

    #[cfg(test)]
    pub fn fail_grants(&self, fail: bool) {
        self.inner.lock().unwrap().fail_grant = fail;
    }

    #[cfg(test)]
    pub fn fail_kicks(&self, fail: bool) {
        self.inner.lock().unwrap().fail_kick = fail;
    }

    pub fn is_member(&self, user: &UserId) -> bool {
        self.inner.lock().unwrap().members.contains_key(user)
    }

    pub fn kicked_users(&self) -> Vec<UserId> {
        self.inner.lock().unwrap().kicked.clone()
    }

    /// Snapshot of every notice delivered so far
    pub fn deliveries(&self) -> Vec<(Delivery, Notice)> {
        self.inner.lock().unwrap().sent.clone()
    }

    fn record(&self, inner: &mut Inner, delivery: Delivery, notice: &Notice) {
        if self.render {
            let target = match &delivery {
                Delivery::Dm(user) => format!("dm:{user}"),
                Delivery::Channel(ch) => format!("#{ch}"),
            };
            println!("[{target}] {:?} {} — {}", notice.kind, notice.title, notice.body);
            for (name, value) in &notice.fields {
                println!("           {name}: {value}");
            }
            if let Some(image) = &notice.image_ref {
                println!("           image: {image}");
            }
        }
        inner.sent.push((delivery, notice.clone()));
    }
}

#[async_trait]
impl ChatPlatform for MemoryPlatform {
    async fn member_has_role(&self, user: &UserId, role: &RoleId) -> Result<bool, PlatformError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .members
            .get(user)
            .is_some_and(|roles| roles.contains(role)))
    }

    async fn role_rank(&self, role: &RoleId) -> Result<Option<u32>, PlatformError> {
        Ok(self.inner.lock().unwrap().roles.get(role).copied())
    }

    async fn bot_rank(&self) -> Result<u32, PlatformError> {
        Ok(self.inner.lock().unwrap().bot_rank)
    }

    async fn bot_has(&self, cap: Capability) -> Result<bool, PlatformError> {
        Ok(self.inner.lock().unwrap().bot_caps.contains(&cap))
    }

    async fn grant_role(&self, user: &UserId, role: &RoleId) -> Result<(), PlatformError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_grant {
            return Err(PlatformError::Rejected("grant rejected".to_string()));
        }
        match inner.members.get_mut(user) {
            Some(roles) => {
                roles.insert(role.clone());
                Ok(())
            }
            None => Err(PlatformError::MemberNotFound(user.to_string())),
        }
    }

    async fn kick(&self, user: &UserId, _reason: &str) -> Result<(), PlatformError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_kick {
            return Err(PlatformError::Rejected("kick rejected".to_string()));
        }
        if inner.members.remove(user).is_none() {
            return Err(PlatformError::MemberNotFound(user.to_string()));
        }
        inner.kicked.push(user.clone());
        Ok(())
    }

    async fn dm(&self, user: &UserId, notice: &Notice) -> Result<(), PlatformError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_dm {
            return Err(PlatformError::DeliveryFailed("dm closed".to_string()));
        }
        self.record(&mut inner, Delivery::Dm(user.clone()), notice);
        Ok(())
    }

    async fn send(&self, channel: &ChannelId, notice: &Notice) -> Result<(), PlatformError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_channel {
            return Err(PlatformError::DeliveryFailed("channel gone".to_string()));
        }
        self.record(&mut inner, Delivery::Channel(channel.clone()), notice);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn grant_adds_role_and_kick_removes_member() {
        let platform = MemoryPlatform::new();
        let user = UserId::from("u1");
        let role = RoleId::from("member");

        platform.define_role(role.clone(), 1);
        platform.join(user.clone());

        assert!(!platform.member_has_role(&user, &role).await.unwrap());
        platform.grant_role(&user, &role).await.unwrap();
        assert!(platform.member_has_role(&user, &role).await.unwrap());

        platform.kick(&user, "test").await.unwrap();
        assert!(!platform.is_member(&user));
        assert_eq!(platform.kicked_users(), vec![user]);
    }

    #[tokio::test]
    async fn dm_failure_is_reported_not_recorded() {
        let platform = MemoryPlatform::new();
        platform.fail_dms(true);

        let result = platform
            .dm(&UserId::from("u1"), &Notice::info("t", "b"))
            .await;

        assert!(result.is_err());
        assert!(platform.deliveries().is_empty());
    }
}
