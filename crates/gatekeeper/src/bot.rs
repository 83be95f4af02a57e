//! Intent dispatcher: wires the platform surface to the verification
//! core, the outcome executor, and the stock store.
//!
//! Every handler returns the notices to show the acting user; staff-facing
//! records go through the event log. The executor runs exactly once per
//! terminal verification outcome, here and nowhere else.

use std::sync::Arc;

use gatekeeper_common::{Notice, RoleId, Service, UserId};
use gatekeeper_common::constants::MAX_ANSWER_LEN;

use crate::intent::Intent;
use crate::logsink::EventLog;
use crate::platform::ChatPlatform;
use crate::stock::{AddReport, GenerateOutcome, StockStore};
use crate::verify::{AnswerOutcome, GrantOutcome, OutcomeExecutor, StartOutcome, Verifier};

/// The assembled bot
pub struct Bot {
    platform: Arc<dyn ChatPlatform>,
    verifier: Arc<Verifier>,
    executor: OutcomeExecutor,
    stock: StockStore,
    log: Arc<EventLog>,
    verified_role: RoleId,
    publisher_role: RoleId,
    premium_role: RoleId,
}

impl Bot {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        platform: Arc<dyn ChatPlatform>,
        verifier: Arc<Verifier>,
        executor: OutcomeExecutor,
        stock: StockStore,
        log: Arc<EventLog>,
        verified_role: RoleId,
        publisher_role: RoleId,
        premium_role: RoleId,
    ) -> Self {
        Self {
            platform,
            verifier,
            executor,
            stock,
            log,
            verified_role,
            publisher_role,
            premium_role,
        }
    }

    /// Membership check that swallows platform failures.
    ///
    /// A failed lookup is treated as "does not hold the role"; for the
    /// verified role this only means the user is offered a challenge they
    /// have already passed, never a lost grant.
    async fn has_role(&self, user: &UserId, role: &RoleId) -> bool {
        match self.platform.member_has_role(user, role).await {
            Ok(held) => held,
            Err(error) => {
                tracing::warn!(user = %user, role = %role, error = %error, "Role lookup failed");
                false
            }
        }
    }

    /// Handle one decoded intent for one user
    pub async fn handle(&self, user: &UserId, intent: Intent) -> Vec<Notice> {
        match intent {
            Intent::Ping => vec![Notice::info("Pong", "Gatekeeper is online.")],
            Intent::ShowHelp => vec![help_notice()],
            Intent::PublishPanel => self.publish_panel(user).await,
            Intent::StartVerification => self.start_verification(user).await,
            Intent::ShowAnswerModal => self.show_answer_modal(user).await,
            Intent::SubmitAnswer { answer } => self.submit_answer(user, &answer).await,
            Intent::ViewStock => self.view_stock().await,
            Intent::AddStock { service, entries } => self.add_stock(user, service, entries).await,
            Intent::Generate { service } => self.generate(user, service).await,
            Intent::ClearStock { service } => self.clear_stock(user, service).await,
            Intent::BackupStock => self.backup_stock(user).await,
        }
    }

    async fn publish_panel(&self, user: &UserId) -> Vec<Notice> {
        if !self.has_role(user, &self.publisher_role).await {
            return vec![Notice::error(
                "Access Denied",
                "Only authorized staff may run this command.",
            )];
        }
        vec![
            panel_notice(),
            Notice::success(
                "Panel Published",
                "The verification panel has been published successfully.",
            ),
        ]
    }

    async fn start_verification(&self, user: &UserId) -> Vec<Notice> {
        let already = self.has_role(user, &self.verified_role).await;
        match self.verifier.start_or_resume(user, already).await {
            StartOutcome::AlreadyVerified => vec![Notice::success(
                "Already Verified",
                "You already have the member role. No further action is required.",
            )],
            StartOutcome::Resumed(view) => {
                vec![
                    Notice::warning(
                        "Active Verification",
                        "You already have an active verification session. Continue below.",
                    )
                    .with_image(view.image_ref.clone())
                    .with_field(
                        "Session Details",
                        format!(
                            "Time left: {}s | Attempts remaining: {}",
                            view.seconds_remaining, view.attempts_remaining
                        ),
                    ),
                ]
            }
            StartOutcome::Challenge(view) => {
                vec![
                    Notice::info(
                        "Verification Challenge",
                        "Hello! Are you human? Let's find out!\n\
                         Type the traced colored characters from left to right, \
                         ignore the decoys, and don't worry about letter case.",
                    )
                    .with_image(view.image_ref.clone())
                    .with_field(
                        "Session Details",
                        format!(
                            "Time limit: {}s | Attempts allowed: {} | Attempts used: 0",
                            view.seconds_remaining,
                            self.verifier.max_attempts()
                        ),
                    ),
                ]
            }
            StartOutcome::Unconfigured => {
                self.log
                    .emit(Notice::error(
                        "Configuration Error",
                        "No captchas are configured; verification cannot start sessions.",
                    ))
                    .await;
                vec![Notice::error(
                    "Configuration Error",
                    "Verification is unavailable right now. Please notify the server staff.",
                )]
            }
        }
    }

    async fn show_answer_modal(&self, user: &UserId) -> Vec<Notice> {
        match self.verifier.store().get(user).await {
            Some((session, _)) if session.created_at.elapsed() < self.verifier.window() => {
                vec![Notice::info(
                    "Enter Captcha",
                    "Submit the characters shown in your challenge image.",
                )]
            }
            _ => vec![Notice::warning(
                "Session Expired",
                "Your verification session has expired. Press Verify to start again.",
            )],
        }
    }

    async fn submit_answer(&self, user: &UserId, raw_answer: &str) -> Vec<Notice> {
        if raw_answer.len() > MAX_ANSWER_LEN {
            return vec![Notice::error(
                "Invalid Answer",
                "That answer is too long to be a captcha code.",
            )];
        }

        match self.verifier.answer(user, raw_answer).await {
            AnswerOutcome::Expired => vec![Notice::warning(
                "Session Expired",
                "Your verification session has expired. Please start a new session.",
            )],
            AnswerOutcome::Verified => match self.executor.grant(user).await {
                GrantOutcome::Granted => vec![Notice::success(
                    "Verification Successful",
                    "You have been verified and granted access.",
                )],
                GrantOutcome::RoleMissing => vec![Notice::error(
                    "Role Missing",
                    "The configured member role was not found. Please contact staff.",
                )],
                GrantOutcome::PermissionMissing => vec![Notice::error(
                    "Permission Required",
                    "The bot cannot assign roles right now. Please contact an administrator.",
                )],
                GrantOutcome::HierarchyError => vec![Notice::error(
                    "Role Hierarchy Issue",
                    "The bot cannot assign the member role. Please contact an administrator.",
                )],
                // The challenge succeeded but the grant did not; this must
                // read as an error, never as a false success.
                GrantOutcome::AssignFailed(_) | GrantOutcome::CheckFailed(_) => {
                    vec![Notice::error(
                        "Role Assignment Error",
                        "Verification passed but the role could not be assigned. Please contact staff.",
                    )]
                }
            },
            AnswerOutcome::Retry(view) => {
                self.log
                    .emit(
                        Notice::error(
                            "Verification Attempt Failed",
                            format!(
                                "{user} failed attempt {}/{}.",
                                view.attempts_used,
                                self.verifier.max_attempts()
                            ),
                        )
                        .with_field("User", user.to_string()),
                    )
                    .await;
                vec![
                    Notice::warning(
                        "Incorrect Captcha",
                        "The code entered is incorrect. Review the image and try again.",
                    )
                    .with_image(view.image_ref.clone())
                    .with_field(
                        "Session Details",
                        format!(
                            "Attempts used: {}/{} | Attempts remaining: {} | Time limit: {}s",
                            view.attempts_used,
                            self.verifier.max_attempts(),
                            view.attempts_remaining,
                            view.seconds_remaining
                        ),
                    ),
                ]
            }
            AnswerOutcome::Exhausted => {
                self.executor.remove(user).await;
                vec![Notice::error(
                    "Verification Failed",
                    "You have exceeded the maximum number of attempts.",
                )]
            }
        }
    }

    async fn view_stock(&self) -> Vec<Notice> {
        let total = self.stock.total().await;
        let mut notice = Notice::info("Generator Stock", "Current stock for all services.");
        for (service, count) in self.stock.counts().await {
            notice = notice.with_field(service.label(), count.to_string());
        }
        vec![notice.with_field("Total Stock", format!("{total} accounts"))]
    }

    async fn add_stock(
        &self,
        user: &UserId,
        service: Service,
        entries: Vec<String>,
    ) -> Vec<Notice> {
        if !self.has_role(user, &self.publisher_role).await {
            return vec![Notice::error(
                "Access Denied",
                "You do not have permission to add stock.",
            )];
        }
        if entries.is_empty() {
            return vec![Notice::error(
                "No Accounts Provided",
                "Include at least one account in email:pass format.",
            )];
        }

        let AddReport {
            added,
            skipped,
            total,
        } = self.stock.add(service, &entries).await;
        if added == 0 {
            return vec![Notice::error(
                "Nothing Added",
                "Every entry was malformed or already in stock.",
            )];
        }
        vec![
            Notice::success("Stock Added", format!("Added to {}.", service.label()))
                .with_field("Added", added.to_string())
                .with_field("Skipped", skipped.to_string())
                .with_field("Total", total.to_string()),
        ]
    }

    async fn generate(&self, user: &UserId, service: Service) -> Vec<Notice> {
        let premium = self.has_role(user, &self.premium_role).await;
        match self.stock.generate(user, service, premium).await {
            GenerateOutcome::Account {
                credential,
                remaining,
            } => {
                // The credential itself travels by DM; the reply only
                // confirms.
                let dm = Notice::success(
                    "Account Generated",
                    format!("Your {} account:", service.label()),
                )
                .with_field("Credentials", credential);
                if let Err(error) = self.platform.dm(user, &dm).await {
                    tracing::warn!(user = %user, error = %error, "Generated-account DM failed");
                    return vec![Notice::error(
                        "Delivery Failed",
                        "Could not DM you the account. Open your DMs and try again later.",
                    )];
                }
                vec![
                    Notice::success("Account Sent", "Check your DMs for the account.")
                        .with_field("Remaining", remaining.to_string()),
                ]
            }
            GenerateOutcome::OutOfStock => vec![Notice::error(
                "Out of Stock",
                format!("There are no accounts available for {}.", service.label()),
            )],
            GenerateOutcome::Cooldown { retry_after_secs } => vec![Notice::warning(
                "Cooldown Active",
                format!("Try again in {retry_after_secs} seconds."),
            )],
        }
    }

    async fn clear_stock(&self, user: &UserId, service: Option<Service>) -> Vec<Notice> {
        if !self.has_role(user, &self.publisher_role).await {
            return vec![Notice::error(
                "Access Denied",
                "You do not have permission to clear stock.",
            )];
        }
        let (scope, dropped) = match service {
            Some(service) => (service.label().to_string(), self.stock.clear(service).await),
            None => ("all services".to_string(), self.stock.clear_all().await),
        };
        self.log
            .emit(
                Notice::warning("Stock Cleared", format!("Stock cleared for {scope}."))
                    .with_field("Dropped", dropped.to_string())
                    .with_field("By", user.to_string()),
            )
            .await;
        vec![Notice::success(
            "Stock Cleared",
            format!("Dropped {dropped} accounts from {scope}."),
        )]
    }

    async fn backup_stock(&self, user: &UserId) -> Vec<Notice> {
        if !self.has_role(user, &self.publisher_role).await {
            return vec![Notice::error(
                "Access Denied",
                "You do not have permission to back up stock.",
            )];
        }
        let snapshot = self.stock.backup().await;
        let document = match serde_json::to_string_pretty(&snapshot) {
            Ok(document) => document,
            Err(error) => {
                tracing::error!(error = %error, "Backup serialization failed");
                return vec![Notice::error(
                    "Backup Failed",
                    "Could not serialize the stock snapshot.",
                )];
            }
        };

        self.log
            .emit(
                Notice::info("Stock Backup Created", "A full stock backup was generated.")
                    .with_field("By", user.to_string()),
            )
            .await;

        let mut notice = Notice::info(
            "Stock Backup Generated",
            "Your stock backup is ready below.",
        )
        .with_field("Generated", chrono::Utc::now().to_rfc3339());
        for (service, count) in self.stock.counts().await {
            notice = notice.with_field(service.label(), count.to_string());
        }
        vec![notice.with_field("Backup", document)]
    }
}

fn panel_notice() -> Notice {
    Notice::info(
        "Server Verification Required",
        "Welcome to our community.\n\
         To keep the server safe, new users complete a short verification step: \
         press Verify to start a private session, read the captcha image, and \
         submit the characters. Success grants the member role and full access.",
    )
}

fn help_notice() -> Notice {
    Notice::info(
        "Verification Guide",
        "1) Press Verify in the main panel.\n\
         2) You will receive a private captcha challenge.\n\
         3) Press Answer, type the characters shown, and submit.\n\
         Read the colored characters left to right, ignore decoys, and note \
         that input is case-insensitive.",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::platform::{Capability, MemoryPlatform};
    use crate::verify::ChallengeCatalog;
    use gatekeeper_common::{ChallengeRecord, NoticeKind};

    struct Harness {
        platform: Arc<MemoryPlatform>,
        bot: Bot,
    }

    fn harness(max_attempts: u32) -> Harness {
        let config = AppConfig::default();
        let platform = Arc::new(MemoryPlatform::new());
        platform.define_role(RoleId::from("member"), 5);
        platform.define_role(RoleId::from("developer"), 8);
        platform.define_role(RoleId::from("premium"), 3);
        platform.set_bot_rank(10);
        platform.allow(Capability::ManageRoles);
        platform.allow(Capability::KickMembers);

        let log = Arc::new(EventLog::new(platform.clone(), None));
        let catalog = ChallengeCatalog::new(vec![ChallengeRecord {
            code: "abc1".to_string(),
            image_ref: "assets/captcha/captcha-0.png".to_string(),
        }]);
        let verifier = Arc::new(Verifier::new(
            catalog,
            config.window(),
            max_attempts,
            log.clone(),
        ));
        let executor = OutcomeExecutor::new(platform.clone(), RoleId::from("member"), log.clone());
        let stock = StockStore::new(config.cooldown(), config.premium_cooldown());

        let bot = Bot::new(
            platform.clone(),
            verifier,
            executor,
            stock,
            log,
            RoleId::from("member"),
            RoleId::from("developer"),
            RoleId::from("premium"),
        );
        Harness { platform, bot }
    }

    #[tokio::test(start_paused = true)]
    async fn full_verification_grants_the_role_once() {
        let h = harness(5);
        let user = UserId::from("u1");
        h.platform.join(user.clone());

        h.bot.handle(&user, Intent::StartVerification).await;
        let replies = h
            .bot
            .handle(
                &user,
                Intent::SubmitAnswer {
                    answer: "ABC1".to_string(),
                },
            )
            .await;

        assert_eq!(replies[0].kind, NoticeKind::Success);
        assert!(
            h.platform
                .member_has_role(&user, &RoleId::from("member"))
                .await
                .unwrap()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn exhausting_attempts_kicks_exactly_once() {
        let h = harness(3);
        let user = UserId::from("u1");
        h.platform.join(user.clone());

        h.bot.handle(&user, Intent::StartVerification).await;
        for _ in 0..2 {
            let replies = h
                .bot
                .handle(
                    &user,
                    Intent::SubmitAnswer {
                        answer: "zzzz".to_string(),
                    },
                )
                .await;
            assert_eq!(replies[0].kind, NoticeKind::Warning);
        }
        let replies = h
            .bot
            .handle(
                &user,
                Intent::SubmitAnswer {
                    answer: "zzzz".to_string(),
                },
            )
            .await;
        assert_eq!(replies[0].kind, NoticeKind::Error);
        assert_eq!(h.platform.kicked_users().len(), 1);

        // A further answer finds no session and triggers nothing new
        h.bot
            .handle(
                &user,
                Intent::SubmitAnswer {
                    answer: "zzzz".to_string(),
                },
            )
            .await;
        assert_eq!(h.platform.kicked_users().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn verified_member_is_short_circuited() {
        let h = harness(5);
        let user = UserId::from("u1");
        h.platform.join(user.clone());
        h.platform
            .grant_role(&user, &RoleId::from("member"))
            .await
            .unwrap();

        let replies = h.bot.handle(&user, Intent::StartVerification).await;
        assert_eq!(replies[0].title, "Already Verified");
    }

    #[tokio::test(start_paused = true)]
    async fn grant_failure_reads_as_an_error_not_success() {
        let h = harness(5);
        let user = UserId::from("u1");
        h.platform.join(user.clone());
        h.platform.fail_grants(true);

        h.bot.handle(&user, Intent::StartVerification).await;
        let replies = h
            .bot
            .handle(
                &user,
                Intent::SubmitAnswer {
                    answer: "abc1".to_string(),
                },
            )
            .await;

        assert_eq!(replies[0].kind, NoticeKind::Error);
        assert_eq!(replies[0].title, "Role Assignment Error");
    }

    #[tokio::test(start_paused = true)]
    async fn stock_admin_intents_are_publisher_gated() {
        let h = harness(5);
        let outsider = UserId::from("u1");
        h.platform.join(outsider.clone());

        let replies = h
            .bot
            .handle(
                &outsider,
                Intent::AddStock {
                    service: Service::Roblox,
                    entries: vec!["a@x.com:pw".to_string()],
                },
            )
            .await;
        assert_eq!(replies[0].title, "Access Denied");

        let staff = UserId::from("staff");
        h.platform.join(staff.clone());
        h.platform
            .grant_role(&staff, &RoleId::from("developer"))
            .await
            .unwrap();

        let replies = h
            .bot
            .handle(
                &staff,
                Intent::AddStock {
                    service: Service::Roblox,
                    entries: vec!["a@x.com:pw".to_string()],
                },
            )
            .await;
        assert_eq!(replies[0].title, "Stock Added");
    }

    #[tokio::test(start_paused = true)]
    async fn generate_delivers_by_dm_and_reports_cooldown() {
        let h = harness(5);
        let staff = UserId::from("staff");
        h.platform.join(staff.clone());
        h.platform
            .grant_role(&staff, &RoleId::from("developer"))
            .await
            .unwrap();
        h.bot
            .handle(
                &staff,
                Intent::AddStock {
                    service: Service::Epic,
                    entries: vec!["a@x.com:pw".to_string(), "b@x.com:pw".to_string()],
                },
            )
            .await;

        let user = UserId::from("u1");
        h.platform.join(user.clone());

        let replies = h
            .bot
            .handle(&user, Intent::Generate { service: Service::Epic })
            .await;
        assert_eq!(replies[0].title, "Account Sent");
        assert!(
            h.platform
                .deliveries()
                .iter()
                .any(|(delivery, notice)| matches!(delivery, crate::platform::Delivery::Dm(_))
                    && notice.title == "Account Generated")
        );

        let replies = h
            .bot
            .handle(&user, Intent::Generate { service: Service::Epic })
            .await;
        assert_eq!(replies[0].title, "Cooldown Active");
    }
}
