//! Text rendering for payer, operator and channel messages. Payers get
//! coarse outcomes; the operator channel gets the structured detail.

use rust_decimal::Decimal;

use kassa_types::models::{Payment, Provider, User, Withdrawal};
use kassa_types::provider::BalanceResult;

/// Whole so'm with comma grouping: `50125` -> `50,125`.
pub fn fmt_amount(amount: Decimal) -> String {
    let whole = amount.round_dp(0).normalize().to_string();
    let (sign, digits) = match whole.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", whole.as_str()),
    };
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{sign}{grouped}")
}

pub fn group_card_number(card_number: &str) -> String {
    if card_number.len() == 16 && card_number.chars().all(|c| c.is_ascii_digit()) {
        format!(
            "{} {} {} {}",
            &card_number[0..4],
            &card_number[4..8],
            &card_number[8..12],
            &card_number[12..16]
        )
    } else {
        card_number.to_string()
    }
}

pub fn mask_card(card_number: &str) -> String {
    if card_number.len() >= 4 {
        format!("**** **** **** {}", &card_number[card_number.len() - 4..])
    } else {
        "****".to_string()
    }
}

/// Hide all but the last `show_last` characters.
pub fn mask_tail(text: &str, show_last: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= show_last {
        return text.to_string();
    }
    let visible: String = chars[chars.len() - show_last..].iter().collect();
    format!("{}{}", "*".repeat(chars.len() - show_last), visible)
}

/// The payment notice shown to the payer after a deposit request is
/// created. The salted total must be transferred exactly; transferring
/// the round amount will not reconcile.
pub fn payment_notice(
    provider: Provider,
    player_id: &str,
    card_number: &str,
    amount_to_pay: Decimal,
    requested_amount: Decimal,
    payment_id: &str,
    user_id: i64,
) -> String {
    format!(
        "Payment details\n\n\
         Provider: {provider}\n\
         ID: {player_id}\n\
         Card: {card}\n\n\
         Transfer exactly: {pay} so'm\n\
         Do NOT transfer: {requested} so'm\n\n\
         The request expires in 5 minutes.\n\
         TG ID: {user_id}\n\
         Payment ID: {payment_id}",
        card = group_card_number(card_number),
        pay = fmt_amount(amount_to_pay),
        requested = fmt_amount(requested_amount),
    )
}

pub fn payer_success(payment: &Payment) -> String {
    format!(
        "Payment received. Provider: {}, amount: {} so'm.",
        payment.provider,
        fmt_amount(payment.amount)
    )
}

pub fn payer_failure() -> &'static str {
    "The payment could not be completed. Please contact support or try again with /start."
}

/// Structured settlement summary for the operator channel.
pub fn channel_summary(payment: &Payment, user: Option<&User>, balance: &BalanceResult) -> String {
    let username = user
        .and_then(|u| u.username.clone())
        .unwrap_or_else(|| "no_username".to_string());
    let phone = user
        .and_then(|u| u.phone.clone())
        .map(|p| mask_tail(&p, 4))
        .unwrap_or_else(|| "no_phone".to_string());
    let desk = match balance {
        BalanceResult::Available { balance, limit } => format!(
            "   • <b>Balance:</b> <code>{}</code>\n   • <b>Limit:</b> <code>{}</code>",
            fmt_amount(*balance),
            fmt_amount(*limit)
        ),
        BalanceResult::Unavailable { .. } => "   • balance unavailable".to_string(),
    };
    format!(
        "📋 <b>Payment #{id}</b>\n\
         💰 <b>Amount:</b> <code>{amount}</code> so'm\n\
         🆔 <b>Player:</b> <code>{player}</code>\n\
         👤 <b>Payer:</b> @{username}\n\
         📞 <b>Tel:</b> <code>{phone}</code>\n\
         🏦 <b>Desk:</b>\n{desk}\n\
         ✅ CREDITED | <b>{provider}</b>",
        id = payment.payment_id,
        amount = fmt_amount(payment.amount),
        player = payment.player_id,
        provider = payment.provider,
    )
}

pub fn credit_failure_alert(payment: &Payment, reason: &str) -> String {
    format!(
        "Credit failed!\n\n\
         Provider: {}\n\
         Player: {}\n\
         Amount: {} so'm\n\
         Payment ID: {}\n\n\
         Reason: {}",
        payment.provider,
        payment.player_id,
        fmt_amount(payment.amount),
        payment.payment_id,
        reason
    )
}

pub fn manual_success(provider: Provider, player_id: &str, amount: Decimal, balance: &BalanceResult) -> String {
    let desk = match balance {
        BalanceResult::Available { balance, limit } => format!(
            "Desk balance: {} so'm, limit: {} so'm",
            fmt_amount(*balance),
            fmt_amount(*limit)
        ),
        BalanceResult::Unavailable { .. } => "Desk balance unavailable".to_string(),
    };
    format!(
        "Operation completed.\n\n\
         Provider: {provider}\n\
         ID: {player_id}\n\
         Amount: {} so'm\n\
         {desk}\n\n\
         (filled manually)",
        fmt_amount(amount)
    )
}

pub fn manual_failure(provider: Provider, player_id: &str, amount: Decimal, reason: &str) -> String {
    format!(
        "Manual deposit failed!\n\n\
         Provider: {provider}\n\
         ID: {player_id}\n\
         Amount: {} so'm\n\n\
         Reason: {reason}",
        fmt_amount(amount)
    )
}

/// Cash-desk balances across all providers, in a fixed order.
pub fn balance_report(entries: &[(Provider, BalanceResult)]) -> String {
    let mut out = String::from("CASH DESK BALANCES\n\n");
    for (provider, result) in entries {
        match result {
            BalanceResult::Available { balance, limit } => {
                out.push_str(&format!(
                    "{provider}:\n   Balance: {} so'm\n   Limit: {} so'm\n\n",
                    fmt_amount(*balance),
                    fmt_amount(*limit)
                ));
            }
            BalanceResult::Unavailable { reason } => {
                out.push_str(&format!("{provider}: unavailable ({reason})\n\n"));
            }
        }
    }
    out.trim_end().to_string()
}

pub fn withdrawal_completed_payer(withdrawal: &Withdrawal) -> String {
    let amount = withdrawal
        .amount
        .map(|a| format!("{} so'm", fmt_amount(a)))
        .unwrap_or_else(|| "—".to_string());
    format!(
        "The money was sent to your card.\n\n\
         Amount: {amount}\n\
         {} ID: {}\n\n\
         Thank you!",
        withdrawal.provider, withdrawal.player_id
    )
}

pub fn withdrawal_channel_summary(withdrawal: &Withdrawal, user: Option<&User>) -> String {
    let username = user
        .and_then(|u| u.username.clone())
        .unwrap_or_else(|| "no_username".to_string());
    let amount = withdrawal
        .amount
        .map(fmt_amount)
        .unwrap_or_else(|| "—".to_string());
    format!(
        "✅ <b>Withdrawal completed</b>\n\n\
         <b>#{provider}#</b>\n\
         👤 @{username}\n\
         💳 <code>{card}</code>\n\
         💰 <b>Amount:</b> {amount}\n\
         🆔 <b>ID:</b> <code>{player}</code>",
        provider = withdrawal.provider,
        card = mask_card(&withdrawal.card_number),
        player = withdrawal.player_id,
    )
}

pub fn withdrawal_operator_alert(withdrawal: &Withdrawal, user: Option<&User>) -> String {
    let username = user
        .and_then(|u| u.username.clone())
        .unwrap_or_else(|| "no_username".to_string());
    format!(
        "New withdrawal request #{id}\n\n\
         Provider: {provider}\n\
         Player: {player}\n\
         Card: {card}\n\
         Code: {code}\n\
         User: @{username}",
        id = withdrawal.id,
        provider = withdrawal.provider,
        player = withdrawal.player_id,
        card = group_card_number(&withdrawal.card_number),
        code = withdrawal.code,
    )
}
