//! 🕵️ Insider Scorer
//!
//! Scores insider trading on the shared 0-100 scale. Weighting favours *who*
//! traded and *whether they traded together* over raw counts:
//!
//! ```text
//! score = 50 + 10·count_balance + 15·exec_direction + 15·cluster_direction + 10·index
//! ```
//!
//! - count_balance: (buys - sells) / (buys + sells)
//! - exec_direction: net direction of CEO/CFO/Chair trades (-1, 0, +1)
//! - cluster_direction: +1 buy cluster, -1 sell cluster, 0 neither or both
//! - index: provider MSPR when supplied, else value-weighted net flow

use super::DomainScorer;
use crate::error::BranchError;
use crate::types::score::RawFeatures;
use crate::types::{
    Domain, InsiderAction, InsiderActivity, InsiderTransaction, LabelThresholds, ScoreResult,
};
use log::debug;
use std::collections::HashSet;

#[derive(Debug, Clone)]
pub struct InsiderScorerConfig {
    /// Trailing window (days before the as-of date) for cluster detection
    pub cluster_window_days: i64,
    /// Distinct insiders needed inside the window to call it a cluster
    pub cluster_min_insiders: usize,
    /// Role fragments (upper-case) mapped to the label reported for them
    pub top_exec_roles: Vec<(String, String)>,
    pub count_weight: f64,
    pub exec_weight: f64,
    pub cluster_weight: f64,
    pub index_weight: f64,
    /// |MSPR| above this reads as Bullish / Bearish
    pub mspr_view_threshold: f64,
}

impl Default for InsiderScorerConfig {
    fn default() -> Self {
        let roles = [
            ("CEO", "CEO"),
            ("CHIEF EXECUTIVE", "CEO"),
            ("CFO", "CFO"),
            ("CHIEF FINANCIAL", "CFO"),
            ("CHAIR", "Chair"),
        ];
        Self {
            cluster_window_days: 7,
            cluster_min_insiders: 2,
            top_exec_roles: roles
                .iter()
                .map(|(fragment, label)| (fragment.to_string(), label.to_string()))
                .collect(),
            count_weight: 10.0,
            exec_weight: 15.0,
            cluster_weight: 15.0,
            index_weight: 10.0,
            mspr_view_threshold: 0.3,
        }
    }
}

pub struct InsiderScorer {
    config: InsiderScorerConfig,
    thresholds: LabelThresholds,
}

impl InsiderScorer {
    pub fn new(config: InsiderScorerConfig, thresholds: LabelThresholds) -> Self {
        Self { config, thresholds }
    }

    pub fn score_activity(&self, activity: &InsiderActivity) -> Result<ScoreResult, BranchError> {
        let cfg = &self.config;
        let txs: Vec<&InsiderTransaction> = activity
            .transactions
            .iter()
            .filter(|t| t.date <= activity.as_of)
            .collect();

        if txs.is_empty() {
            return Err(BranchError::InsufficientData(format!(
                "no insider transactions on or before {}",
                activity.as_of
            )));
        }

        let buys = txs.iter().filter(|t| t.action == InsiderAction::Buy).count();
        let sells = txs.len() - buys;
        let count_balance = (buys as f64 - sells as f64) / txs.len() as f64;
        let net_activity = if buys > sells {
            "Buy"
        } else if sells > buys {
            "Sell"
        } else {
            "Mixed"
        };

        // Executive participation
        let mut top_execs: Vec<String> = Vec::new();
        let mut exec_net = 0i64;
        for tx in &txs {
            if let Some(label) = self.top_exec_label(&tx.role) {
                if !top_execs.iter().any(|l| l == label) {
                    top_execs.push(label.to_string());
                }
                exec_net += match tx.action {
                    InsiderAction::Buy => 1,
                    InsiderAction::Sell => -1,
                };
            }
        }
        top_execs.sort();
        let exec_direction = exec_net.signum() as f64;

        let buy_cluster = self.is_cluster(&txs, InsiderAction::Buy, activity);
        let sell_cluster = self.is_cluster(&txs, InsiderAction::Sell, activity);
        let cluster_direction = match (buy_cluster, sell_cluster) {
            (true, false) => 1.0,
            (false, true) => -1.0,
            _ => 0.0,
        };

        let (index, index_source) = match activity.mspr {
            Some(mspr) if mspr.is_finite() => (mspr.clamp(-1.0, 1.0), "mspr"),
            _ => (net_flow(&txs), "net_flow"),
        };
        let mspr_view = if index > cfg.mspr_view_threshold {
            "Bullish"
        } else if index < -cfg.mspr_view_threshold {
            "Bearish"
        } else {
            "Neutral"
        };

        let score = 50.0
            + cfg.count_weight * count_balance
            + cfg.exec_weight * exec_direction
            + cfg.cluster_weight * cluster_direction
            + cfg.index_weight * index;

        let mut features = RawFeatures::new();
        features.insert("total_buys".to_string(), buys.into());
        features.insert("total_sells".to_string(), sells.into());
        features.insert("net_activity".to_string(), net_activity.into());
        features.insert("top_execs_involved".to_string(), top_execs.clone().into());
        features.insert("recent_cluster".to_string(), buy_cluster.into());
        features.insert("sell_cluster".to_string(), sell_cluster.into());
        features.insert("sentiment_index".to_string(), index.into());
        features.insert("index_source".to_string(), index_source.into());
        features.insert("mspr_view".to_string(), mspr_view.into());

        let mut parts = Vec::new();
        if !top_execs.is_empty() {
            parts.push(format!("Executives involved: {}", top_execs.join(", ")));
        }
        parts.push(format!(
            "Net {} activity ({} buys vs {} sells)",
            net_activity.to_lowercase(),
            buys,
            sells
        ));
        parts.push(format!("{} {:+.2} -> {}", index_source, index, mspr_view));
        if buy_cluster {
            parts.push("recent cluster buying".to_string());
        }
        if sell_cluster {
            parts.push("recent cluster selling".to_string());
        }

        debug!(
            "🕵️ Insider {}: {}B/{}S execs={:?} cluster={}/{} index={:+.2}",
            activity.ticker, buys, sells, top_execs, buy_cluster, sell_cluster, index
        );

        ScoreResult::new(
            Domain::Insider,
            score,
            &self.thresholds,
            parts.join(". "),
            features,
        )
    }

    fn top_exec_label(&self, role: &str) -> Option<&str> {
        let role = role.to_uppercase();
        self.config
            .top_exec_roles
            .iter()
            .find(|(fragment, _)| role.contains(fragment.as_str()))
            .map(|(_, label)| label.as_str())
    }

    /// At least `cluster_min_insiders` distinct insiders trading in the same
    /// direction within the trailing window.
    fn is_cluster(
        &self,
        txs: &[&InsiderTransaction],
        action: InsiderAction,
        activity: &InsiderActivity,
    ) -> bool {
        let insiders: HashSet<&str> = txs
            .iter()
            .filter(|t| t.action == action)
            .filter(|t| (activity.as_of - t.date).num_days() <= self.config.cluster_window_days)
            .map(|t| t.insider.as_str())
            .collect();
        insiders.len() >= self.config.cluster_min_insiders
    }
}

impl DomainScorer for InsiderScorer {
    type Input = InsiderActivity;

    fn domain(&self) -> Domain {
        Domain::Insider
    }

    fn score(&self, input: &InsiderActivity) -> Result<ScoreResult, BranchError> {
        self.score_activity(input)
    }
}

/// Value-weighted net flow in [-1, 1]; share count stands in for missing value
fn net_flow(txs: &[&InsiderTransaction]) -> f64 {
    let (bought, sold) = txs.iter().fold((0.0, 0.0), |(b, s), t| {
        let size = t.value.unwrap_or(t.shares).abs();
        match t.action {
            InsiderAction::Buy => (b + size, s),
            InsiderAction::Sell => (b, s + size),
        }
    });
    let total = bought + sold;
    if total > 0.0 {
        (bought - sold) / total
    } else {
        0.0
    }
}
