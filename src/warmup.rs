//! Warmup pairing generator.
//!
//! Every account sends one warmup message per round to an account on a
//! *different* domain. Same-domain warmup builds no cross-domain reputation
//! and looks like a spam loop, so a pool with a single domain is rejected
//! outright rather than degraded.
//!
//! Pairings are not de-duplicated across rounds, and an account is not
//! guaranteed to receive anything in a given round.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::accounts::Account;
use crate::error::ConfigError;
use crate::random::{RandomSource, ThreadRandom};
use crate::spintax::{self, MergeFields};

/// A spintax subject/body pair. `{FirstName}` is the receiver, `{YourName}`
/// the sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarmupTemplate {
    pub subject: String,
    pub body: String,
}

impl WarmupTemplate {
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
        }
    }
}

/// One generated warmup message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarmupPairing {
    pub sender_id: String,
    pub receiver_email: String,
    pub subject: String,
    pub body: String,
}

/// Built-in warmup conversation templates.
pub fn default_templates() -> Vec<WarmupTemplate> {
    vec![
        WarmupTemplate::new(
            "{Quick question|Question for you|Hi {FirstName}|Following up|{Just|Only} checking in|About our {call|conversation}}",
            "{Hi|Hello|Hey} {FirstName},\n\n\
             {Hope your week is going {well|smoothly}.|Hope all is well on your end.|How are things {going|on your side}?}\n\n\
             {I wanted to|Just wanted to|I'm writing to} {follow up on|check in about|ask about} the {draft|notes|files|proposal} we {went over|talked about|discussed} {last week|recently|the other day}.\n\n\
             {Did you get|Have you had} {a chance|a moment|some time} to {look through|review|go over} {it|them}? {Happy to|Glad to|Keen to} {move ahead|wrap this up|get it finalised} {soon|this week|whenever suits}.\n\n\
             {Thanks,|Best,|Talk soon,|Cheers,} {YourName}",
        ),
        WarmupTemplate::new(
            "{{Call|Meeting} next week?|Time to {catch up|connect}?|Quick sync|{Monday|Wednesday|Friday} catch-up}",
            "{Hi|Hey} {FirstName},\n\n\
             {Do you have|Would you have|Any chance of} {twenty minutes|a few minutes|some time} {next week|this week|soon} for a {quick|short} {call|chat}?\n\n\
             I'd like to {run through|talk over|review} the {rollout plan|budget|timeline|latest numbers}. {Shouldn't take long.|It'll be {10|15} minutes at most.|We can keep it brief.}\n\n\
             {Let me know what suits you.|Send over a few times?|What works for you?} {Thanks,|Best,|Cheers,} {YourName}",
        ),
    ]
}

/// Produces cross-domain sender → receiver warmup pairings.
pub struct WarmupGenerator {
    templates: Vec<WarmupTemplate>,
    rng: Arc<dyn RandomSource>,
}

impl WarmupGenerator {
    /// Generator with the built-in templates and the thread RNG.
    pub fn new() -> Self {
        Self {
            templates: default_templates(),
            rng: Arc::new(ThreadRandom),
        }
    }

    /// Replace the template set. An empty set is rejected.
    pub fn with_templates(mut self, templates: Vec<WarmupTemplate>) -> Result<Self, ConfigError> {
        if templates.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "warmup.templates".into(),
                message: "at least one template is required".into(),
            });
        }
        self.templates = templates;
        Ok(self)
    }

    pub fn with_rng(mut self, rng: Arc<dyn RandomSource>) -> Self {
        self.rng = rng;
        self
    }

    /// Generate one pairing per account, each account sending exactly once.
    pub fn generate(&self, accounts: &[Account]) -> Result<Vec<WarmupPairing>, ConfigError> {
        let by_domain = group_by_domain(accounts);
        if by_domain.len() < 2 {
            return Err(ConfigError::InsufficientDomainDiversity {
                found: by_domain.len(),
            });
        }

        let rng = self.rng.as_ref();
        let mut pairings = Vec::with_capacity(accounts.len());

        for sender in accounts {
            let sender_domain = sender.domain_key();
            let targets: Vec<&(String, Vec<&Account>)> = by_domain
                .iter()
                .filter(|(domain, _)| *domain != sender_domain)
                .collect();
            let (target_domain, receivers) = targets[rng.index(targets.len())];
            let receiver = receivers[rng.index(receivers.len())];

            let template = &self.templates[rng.index(self.templates.len())];
            let fields = MergeFields::new()
                .with("FirstName", receiver.first_name.as_str())
                .with("YourName", sender.first_name.as_str());

            debug!(
                sender = %sender.email,
                receiver = %receiver.email,
                domain = %target_domain,
                "Paired warmup sender"
            );

            pairings.push(WarmupPairing {
                sender_id: sender.id.clone(),
                receiver_email: receiver.email.clone(),
                subject: spintax::render(&template.subject, &fields, rng),
                body: spintax::render(&template.body, &fields, rng),
            });
        }

        info!(
            pairings = pairings.len(),
            domains = by_domain.len(),
            "Generated warmup round"
        );
        Ok(pairings)
    }
}

impl Default for WarmupGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Group accounts by case-folded domain, preserving first-appearance order.
fn group_by_domain(accounts: &[Account]) -> Vec<(String, Vec<&Account>)> {
    let mut groups: Vec<(String, Vec<&Account>)> = Vec::new();
    for account in accounts {
        let key = account.domain_key();
        match groups.iter_mut().find(|(domain, _)| *domain == key) {
            Some((_, members)) => members.push(account),
            None => groups.push((key, vec![account])),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::random::SeededRandom;
    use crate::random::testing::ScriptedRandom;

    fn pool() -> Vec<Account> {
        vec![
            Account::new("a1", "ana@alpha.io", "Ana", 40),
            Account::new("a2", "ben@alpha.io", "Ben", 40),
            Account::new("b1", "cho@bravo.dev", "Cho", 40),
            Account::new("c1", "dee@charlie.co", "Dee", 40),
            Account::new("c2", "eli@charlie.co", "Eli", 40),
        ]
    }

    #[test]
    fn pairings_never_share_a_domain() {
        let accounts = pool();
        let by_email: HashMap<&str, &Account> =
            accounts.iter().map(|a| (a.email.as_str(), a)).collect();
        let by_id: HashMap<&str, &Account> = accounts.iter().map(|a| (a.id.as_str(), a)).collect();

        let generator = WarmupGenerator::new().with_rng(Arc::new(SeededRandom::new(11)));
        for _ in 0..200 {
            for pairing in generator.generate(&accounts).unwrap() {
                let sender = by_id[pairing.sender_id.as_str()];
                let receiver = by_email[pairing.receiver_email.as_str()];
                assert_ne!(sender.domain, receiver.domain);
            }
        }
    }

    #[test]
    fn every_account_sends_exactly_once() {
        let accounts = pool();
        let pairings = WarmupGenerator::new().generate(&accounts).unwrap();
        let senders: Vec<&str> = pairings.iter().map(|p| p.sender_id.as_str()).collect();
        assert_eq!(senders, vec!["a1", "a2", "b1", "c1", "c2"]);
    }

    #[test]
    fn single_domain_is_rejected() {
        let accounts = vec![
            Account::new("a1", "ana@alpha.io", "Ana", 40),
            Account::new("a2", "ben@alpha.io", "Ben", 40),
        ];
        let err = WarmupGenerator::new().generate(&accounts).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InsufficientDomainDiversity { found: 1 }
        ));
    }

    #[test]
    fn empty_pool_is_rejected() {
        let err = WarmupGenerator::new().generate(&[]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InsufficientDomainDiversity { found: 0 }
        ));
    }

    #[test]
    fn rendered_messages_carry_names_and_no_markup() {
        let accounts = pool();
        let generator = WarmupGenerator::new().with_rng(Arc::new(SeededRandom::new(5)));
        for pairing in generator.generate(&accounts).unwrap() {
            assert!(!pairing.body.contains('{'), "body: {}", pairing.body);
            assert!(!pairing.body.contains('}'));
            assert!(!pairing.subject.contains('{'));

            let sender = accounts.iter().find(|a| a.id == pairing.sender_id).unwrap();
            let receiver = accounts
                .iter()
                .find(|a| a.email == pairing.receiver_email)
                .unwrap();
            assert!(pairing.body.contains(&receiver.first_name));
            assert!(pairing.body.trim_end().ends_with(&sender.first_name));
        }
    }

    #[test]
    fn scripted_choices_pick_exact_receiver() {
        let accounts = vec![
            Account::new("a1", "ana@alpha.io", "Ana", 40),
            Account::new("b1", "cho@bravo.dev", "Cho", 40),
            Account::new("c1", "dee@charlie.co", "Dee", 40),
        ];
        let template = WarmupTemplate::new("Hello {FirstName}", "From {YourName}");
        // a1: target domain index 1 of [bravo, charlie] -> charlie, receiver 0, template 0.
        // b1: target index 0 of [alpha, charlie] -> alpha, receiver 0, template 0.
        // c1: target index 1 of [alpha, bravo] -> bravo, receiver 0, template 0.
        let rng = ScriptedRandom::new(&[1, 0, 0, 0, 0, 0, 1, 0, 0]);
        let generator = WarmupGenerator::new()
            .with_templates(vec![template])
            .unwrap()
            .with_rng(Arc::new(rng));

        let pairings = generator.generate(&accounts).unwrap();
        assert_eq!(pairings[0].receiver_email, "dee@charlie.co");
        assert_eq!(pairings[0].subject, "Hello Dee");
        assert_eq!(pairings[0].body, "From Ana");
        assert_eq!(pairings[1].receiver_email, "ana@alpha.io");
        assert_eq!(pairings[2].receiver_email, "cho@bravo.dev");
        assert_eq!(pairings[2].body, "From Dee");
    }

    #[test]
    fn empty_template_set_is_rejected() {
        assert!(WarmupGenerator::new().with_templates(vec![]).is_err());
    }

    #[test]
    fn domains_differing_only_in_case_are_one_domain() {
        let mut shouted = Account::new("a2", "ben@ALPHA.io", "Ben", 40);
        shouted.domain = "ALPHA.io".into();
        let accounts = vec![Account::new("a1", "ana@alpha.io", "Ana", 40), shouted];
        let err = WarmupGenerator::new().generate(&accounts).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InsufficientDomainDiversity { found: 1 }
        ));

        let accounts = vec![
            Account::new("a1", "ana@alpha.io", "Ana", 40),
            Account::new("a2", "ben@beta.io", "Ben", 40).with_domain("Alpha.IO"),
        ];
        assert!(WarmupGenerator::new().generate(&accounts).is_err());
    }

    #[test]
    fn explicit_domain_overrides_email() {
        let accounts = vec![
            Account::new("a1", "ana@alpha.io", "Ana", 40),
            Account::new("a2", "ben@alpha.io", "Ben", 40).with_domain("bravo.dev"),
        ];
        let pairings = WarmupGenerator::new().generate(&accounts).unwrap();
        assert_eq!(pairings[0].receiver_email, "ben@alpha.io");
        assert_eq!(pairings[1].receiver_email, "ana@alpha.io");
    }
}
