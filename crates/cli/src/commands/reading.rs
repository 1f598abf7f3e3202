//! Horoscope and feature readings.
//!
//! # Usage
//!
//! ```bash
//! astro horoscope leo
//! astro feature aura --yes --html
//! ```

use astro_dozi_app::{AppError, AstroApp, FeatureFlow, Gate, Rendered};
use astro_dozi_core::{FeatureKind, ZodiacSign};
use tracing::debug;

/// Show today's horoscope for `sign` or the selected sign.
///
/// # Errors
///
/// Returns an error for an unknown sign, when no sign is selected, or when
/// HTML rendering fails.
pub async fn horoscope(app: &AstroApp, sign: Option<&str>, html: bool) -> Result<(), AppError> {
    let sign = sign.map(ZodiacSign::parse).transpose()?;
    let rendered = app.horoscope(sign).await?;
    print_rendered(&rendered, html)
}

/// Request a feature, charging coins when `confirm` is set.
///
/// # Errors
///
/// Returns an error for an unknown feature, a failed charge, or when HTML
/// rendering fails.
pub async fn feature(
    app: &AstroApp,
    feature: &str,
    confirm: bool,
    html: bool,
) -> Result<(), AppError> {
    let kind = FeatureKind::parse(feature)?;

    let message = match app.request_feature(kind).await {
        FeatureFlow::Shown(rendered) => return print_rendered(&rendered, html),
        FeatureFlow::Gated(Gate::Confirm { .. }) if confirm => {
            let rendered = app.confirm_feature().await?;
            return print_rendered(&rendered, html);
        }
        FeatureFlow::Gated(Gate::Confirm { cost }) => format!(
            "{} {cost} Yildiz Tozu. Onaylamak icin: astro feature {} --yes",
            kind.display_name(),
            kind.id()
        ),
        FeatureFlow::Gated(Gate::Insufficient { balance, cost }) => format!(
            "Yetersiz bakiye: {balance} / {cost} Yildiz Tozu. Yuklemek icin: astro buy"
        ),
        FeatureFlow::Gated(Gate::SignInRequired) => {
            "Bu ozellik icin giris yapmalisin: astro sign-in".to_string()
        }
        FeatureFlow::Gated(Gate::Granted) => {
            debug!("granted gate without a reading");
            return Ok(());
        }
    };

    #[allow(clippy::print_stdout)]
    {
        println!("{message}");
    }
    Ok(())
}

fn print_rendered(rendered: &Rendered, html: bool) -> Result<(), AppError> {
    debug!(source = ?rendered.source, shown = rendered.shown, "rendered");
    let output = if html {
        rendered.presentation.to_html()?
    } else {
        rendered.presentation.to_string()
    };

    #[allow(clippy::print_stdout)]
    {
        println!("{output}");
        if let Some(source) = rendered.source.filter(|_| !html) {
            println!("(kaynak: {source})");
        }
    }
    Ok(())
}
