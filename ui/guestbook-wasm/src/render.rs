//! Presentation components.
//!
//! Pure functions from controller snapshots to HTML. Every piece of user or
//! contract supplied text goes through [`escape`].

use gb_api_types::{CurrentUser, Message, format_near_amount, parse_near_amount};
use gb_config::{NetworkConfig, switch_network_href};
use gb_controller::{FormState, Notice, Snapshot};

pub fn escape(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => output.push_str("&amp;"),
            '<' => output.push_str("&lt;"),
            '>' => output.push_str("&gt;"),
            '"' => output.push_str("&quot;"),
            '\'' => output.push_str("&#39;"),
            _ => output.push(ch),
        }
    }
    output
}

/// Whole page for one snapshot.
pub fn render_page(snapshot: &Snapshot, config: &NetworkConfig, page_href: &str) -> String {
    let mut html = String::from("<main>");
    html.push_str(&render_header(snapshot, config, page_href));
    if let Some(notice) = &snapshot.notice {
        html.push_str(&render_notice(notice));
    }
    match &snapshot.current_user {
        Some(user) => html.push_str(&render_form(user, &snapshot.form)),
        None => html.push_str(&render_sign_in()),
    }
    if snapshot.show_messages() {
        html.push_str(&render_messages(&snapshot.messages));
    }
    html.push_str("</main>");
    html
}

pub fn render_header(snapshot: &Snapshot, config: &NetworkConfig, page_href: &str) -> String {
    let neth = escape(&config.neth_url);
    let auth_button = if snapshot.current_user.is_some() {
        r#"<button type="button" data-action="sign-out">Log out</button>"#
    } else if snapshot.show_sign_in_button() {
        r#"<button type="button" data-action="sign-in">Log in</button>"#
    } else {
        ""
    };

    format!(
        r#"<header><h2>NETH Support - Network: {network}</h2><p>Switch to <a href="{switch}" data-action="switch-network">{other} by clicking here</a>.</p><p>This example app uses <a href="{neth}" target="_blank">NETH accounts</a>. You can sign in with MyNearWallet or use your <a href="{neth}" target="_blank">NETH Account</a>.</p><h2>Guest Book</h2>{auth_button}</header>"#,
        network = escape(&config.network_id.0),
        switch = escape(&switch_network_href(config, page_href)),
        other = config.other_network(),
    )
}

pub fn render_sign_in() -> String {
    concat!(
        r#"<section class="sign-in"><p>This app lets you leave a message on the blockchain. "#,
        r#"Once you sign in, messages without a donation are posted right away; "#,
        r#"adding a donation asks your wallet to confirm the transfer.</p>"#,
        r#"<p>Go ahead and sign in to try it out!</p></section>"#
    )
    .to_owned()
}

pub fn render_form(user: &CurrentUser, form: &FormState) -> String {
    let disabled = if form.is_disabled() { " disabled" } else { "" };
    let checked = if form.draft.send_as_two { " checked" } else { "" };
    let balance = balance_yocto(&user.balance);
    let max = balance
        .map(|yocto| format!(r#" max="{}""#, format_near_amount(yocto, 24).replace(',', "")))
        .unwrap_or_default();
    let hint = match balance {
        Some(yocto) => format!(r#"<small class="balance">Balance: {} Ⓝ</small>"#, format_near_amount(yocto, 2)),
        None => r#"<small class="balance balance--unknown">Balance unavailable</small>"#.to_owned(),
    };

    format!(
        r#"<form id="guestbook-form"><fieldset id="fieldset"{disabled}><p>Sign the guest book, {account}!</p><p class="highlight"><label for="message">Message:</label><input autocomplete="off" autofocus id="message" name="message" required value="{text}"></p><p><label for="donation">Donation (optional):</label><input autocomplete="off" id="donation" name="donation" min="0" step="0.01" type="number" value="{donation}"{max}><span title="NEAR Tokens">Ⓝ</span>{hint}</p><p><label for="multiple">Multiple Transactions:</label><input type="checkbox" id="multiple" name="multiple"{checked}></p><button type="submit">Sign</button></fieldset></form>"#,
        account = escape(&user.account_id.0),
        text = escape(&form.draft.text),
        donation = escape(&form.draft.donation),
    )
}

pub fn render_messages(messages: &[Message]) -> String {
    let mut html = String::from(r#"<section class="messages"><h2>Messages</h2>"#);
    for message in messages {
        let class = if message.premium { r#" class="is-premium""# } else { "" };
        html.push_str(&format!(
            "<p{class}><strong>{sender}</strong>:<br/>{text}</p>",
            sender = escape(&message.sender),
            text = escape(&message.text),
        ));
    }
    html.push_str("</section>");
    html
}

pub fn render_notice(notice: &Notice) -> String {
    format!(
        r#"<div class="notice notice--error" role="alert">{text}<button type="button" data-action="dismiss">Dismiss</button></div>"#,
        text = escape(&notice.text),
    )
}

/// Balances arrive as yocto integers; anything else is shown as unavailable.
fn balance_yocto(balance: &str) -> Option<u128> {
    balance
        .parse::<u128>()
        .ok()
        .or_else(|| parse_near_amount(balance).ok())
}
