//! Scripted probes: send a stimulus, check the bot's response.

use regex::Regex;
use tracing::{info, warn};

use crate::harness::controller::BotController;
use crate::harness::error::CollectError;
use crate::harness::expectation::Expectation;
use crate::harness::response::Response;
use crate::harness::timeouts::TimeoutPolicy;
use crate::harness::transport::Transport;

/// One stimulus and what the reply must look like.
#[derive(Debug, Clone)]
pub struct Probe {
    pub send: String,
    pub expectation: Expectation,
    /// Regex the full response text must match.
    pub pattern: Option<Regex>,
    pub policy: TimeoutPolicy,
}

#[derive(Debug)]
pub enum ProbeOutcome {
    Passed(Response),
    Failed(String),
}

impl ProbeOutcome {
    pub fn passed(&self) -> bool {
        matches!(self, Self::Passed(_))
    }
}

#[derive(Debug)]
pub struct ProbeReport {
    pub send: String,
    pub outcome: ProbeOutcome,
}

impl Probe {
    /// Judge the result of collecting this probe's response.
    pub fn evaluate(&self, result: Result<Response, CollectError>) -> ProbeOutcome {
        let response = match result {
            Ok(r) => r,
            Err(e) => return ProbeOutcome::Failed(e.to_string()),
        };

        // Without raise_on_timeout the collector only logs unmet expectations.
        if !self.expectation.matches(response.count()) {
            return ProbeOutcome::Failed(format!(
                "received {} message(s), expectation {:?} not met",
                response.count(),
                self.expectation
            ));
        }

        if let Some(ref pattern) = self.pattern {
            let text = response.full_text();
            if !pattern.is_match(&text) {
                return ProbeOutcome::Failed(format!(
                    "response {:?} does not match /{}/",
                    text,
                    pattern.as_str()
                ));
            }
        }

        ProbeOutcome::Passed(response)
    }
}

/// Run every probe in order against the controller's peer.
pub async fn run_probes<T: Transport>(controller: &BotController<T>, probes: &[Probe]) -> Vec<ProbeReport> {
    let mut reports = Vec::with_capacity(probes.len());

    for probe in probes {
        info!("▶️ Probe: {:?}", probe.send);
        let result = controller
            .send_text(&probe.send, probe.expectation, Some(&probe.policy))
            .await;
        let outcome = probe.evaluate(result);

        match outcome {
            ProbeOutcome::Passed(ref response) => {
                info!("✅ PASS {:?} ({} message(s))", probe.send, response.count());
            }
            ProbeOutcome::Failed(ref reason) => {
                warn!("❌ FAIL {:?}: {}", probe.send, reason);
            }
        }

        reports.push(ProbeReport {
            send: probe.send.clone(),
            outcome,
        });
    }

    reports
}
