//! Display and printing utilities

use tracing::{error, info, warn};
use crate::bot::SessionStats;
use crate::risk::RiskSnapshot;
use crate::types::{ArbitrageOpportunity, TradeOutcome, TradeResult};

pub fn print_session_stats(stats: &SessionStats, risk: &RiskSnapshot) {
    let runtime = stats.runtime_minutes();

    info!("\n📊 Session Statistics ({} minutes)", runtime);
    info!("   🔍 DETECTION:");
    info!("     Ticks: {} ({} skipped)", stats.ticks, stats.ticks_skipped);
    info!("     Quotes received: {} ({} errors)", stats.quotes_received, stats.quote_errors);
    info!("     Opportunities detected: {}", stats.opportunities_detected);

    info!("   🛡️  RISK GATE:");
    info!("     Approved: {}", stats.approved);
    info!("     Reduced: {}", stats.reduced);
    info!("     Rejected: {}", stats.rejected);
    if !stats.rejections.is_empty() {
        let mut reasons: Vec<_> = stats.rejections.iter().collect();
        reasons.sort_by(|a, b| b.1.cmp(a.1));
        for (reason, count) in reasons {
            info!("       {}: {}", reason, count);
        }
    }

    info!("   🚀 TRADE EXECUTION:");
    info!("     Total executions: {}", stats.executed);
    info!("     Confirmed: {}", stats.confirmed);
    info!("     Simulated: {}", stats.simulated);
    info!("     Failed: {}", stats.failed);
    info!("     Success rate: {:.1}%", stats.success_rate());
    info!("     Realized P&L: ${:.2}", stats.realized_pnl);
    if !stats.failures.is_empty() {
        info!("     Failure summary:");
        for (kind, count) in stats.failures.iter() {
            info!("       {:?}: {}", kind, count);
        }
    }

    info!("   ⚙️  SYSTEM:");
    info!("     Circuit breaker: {}", risk.breaker.label());
    info!("     Kill switch: {}", if risk.kill_engaged { "ENGAGED" } else { "off" });
    info!("     Exposure: ${:.2} ({} in flight)", risk.exposure, risk.in_flight);
    info!("     Value at risk (95%): ${:.2}", risk.value_at_risk);
    info!(
        "     Today ({}): {} trades, {} wins, {} losses, P&L ${:.2}",
        risk.ledger.day, risk.ledger.trades, risk.ledger.wins, risk.ledger.losses, risk.ledger.realized_pnl
    );
    info!("");
}

pub fn print_opportunity(opportunity: &ArbitrageOpportunity) {
    warn!("\n🎯 ARBITRAGE OPPORTUNITY #{}", opportunity.id);
    warn!("📋 Source: {}", opportunity.source);
    warn!("📍 Route: {}", opportunity.route_description());
    warn!("💰 Profit Analysis:");
    warn!("   Buy:  {} @ {:.6}", opportunity.buy_venue, opportunity.buy_price);
    warn!("   Sell: {} @ {:.6}", opportunity.sell_venue, opportunity.sell_price);
    warn!("   Gross: {:.4}%", opportunity.gross_profit_pct);
    warn!("   Net:   {:.4}%", opportunity.net_profit_pct);
    if let Some(size) = opportunity.recommended_size {
        warn!("   Suggested size: ${:.2}", size);
    }
}

pub fn print_trade_result(result: &TradeResult) {
    match &result.outcome {
        TradeOutcome::Confirmed | TradeOutcome::Simulated => {
            warn!("\n✅ TRADE {} #{}", if result.outcome == TradeOutcome::Simulated { "SIMULATED" } else { "CONFIRMED" }, result.opportunity_id);
            warn!("   Pair: {}", result.pair);
            if let Some(path) = result.path {
                warn!("   Path: {}", path);
            }
            if let Some(signature) = &result.signature {
                warn!("   Signature: {}", signature);
            }
            warn!("   Size: ${:.2}", result.size);
            warn!("   Realized P&L: ${:.4}", result.realized_pnl);
            warn!("   Latency: {}ms ({} attempts)", result.latency_ms, result.attempts);
        }
        TradeOutcome::Failed { kind, reason } => {
            error!("\n❌ TRADE FAILED #{}", result.opportunity_id);
            error!("   Kind: {:?}", kind);
            error!("   Reason: {}", reason);
            error!("   Realized P&L: ${:.4}", result.realized_pnl);
        }
    }
}
