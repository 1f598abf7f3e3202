//! Session and account commands.
//!
//! # Environment Variables
//!
//! - `ASTRO_USER_ID` - Account used by `sign-in`
//! - `ASTRO_DATA_DIR` - Where guest state and cached readings are kept

use astro_dozi_app::{AppError, AstroApp};
use astro_dozi_core::{Identity, UnknownSign, ZodiacSign};

/// List the zodiac catalog.
pub fn signs() {
    for sign in ZodiacSign::ALL {
        let (start, end) = sign.date_range();
        #[allow(clippy::print_stdout)]
        {
            println!(
                "{} {:<12} {:<8} {start} - {end}",
                sign.emoji(),
                sign.id(),
                sign.display_name()
            );
        }
    }
}

/// Print who is signed in and what they own.
pub fn balance(app: &AstroApp) {
    let session = app.session();
    let who = match session.identity() {
        Identity::SignedOut => "giris yapilmadi".to_string(),
        Identity::Guest => "misafir".to_string(),
        Identity::User(user) => user
            .display_name
            .clone()
            .or_else(|| user.email.clone())
            .unwrap_or_else(|| user.uid.to_string()),
    };
    let sign = session.selected_sign().map_or("-", ZodiacSign::display_name);

    #[allow(clippy::print_stdout)]
    {
        println!("Kullanici: {who}");
        println!("Yildiz Tozu: {}", session.coin_balance());
        println!("Premium: {}", if session.is_premium() { "evet" } else { "hayir" });
        println!("Burc: {sign}");
    }
}

/// Select and persist a sign.
///
/// # Errors
///
/// Returns an error if guest state cannot be written.
pub async fn select(app: &AstroApp, token: &str) -> Result<(), AppError> {
    match app.select_sign(token).await? {
        Some(sign) => {
            #[allow(clippy::print_stdout)]
            {
                println!("{} {} secildi.", sign.emoji(), sign.display_name());
            }
            Ok(())
        }
        None => Err(UnknownSign(token.to_string()).into()),
    }
}

/// Enter guest mode.
///
/// # Errors
///
/// Returns an error if the guest flag cannot be stored.
pub fn guest(app: &AstroApp) -> Result<(), AppError> {
    app.continue_as_guest()?;
    Ok(())
}

/// Sign in with the configured account.
///
/// # Errors
///
/// Returns an error if the identity provider fails.
pub async fn sign_in(app: &AstroApp) -> Result<(), AppError> {
    if let Some(user) = app.sign_in().await? {
        #[allow(clippy::print_stdout)]
        {
            let name = user.display_name.as_deref().unwrap_or(user.uid.as_str());
            println!("Hos geldin, {name}!");
        }
    }
    Ok(())
}
