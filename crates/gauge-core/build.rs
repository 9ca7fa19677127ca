//! Embeds publish credentials from an optional `.env` file.
//!
//! Only `GAUGE_`-prefixed keys are forwarded; everything else in the file
//! is ignored. Variables already present in the build environment win.

fn main() {
    println!("cargo:rerun-if-changed=.env");
    println!("cargo:rerun-if-env-changed=GAUGE_CHANNEL_ID");
    println!("cargo:rerun-if-env-changed=GAUGE_WRITE_KEY");

    let Ok(entries) = dotenvy::dotenv_iter() else {
        return;
    };

    for (key, value) in entries.flatten() {
        if key.starts_with("GAUGE_") && std::env::var_os(&key).is_none() {
            println!("cargo:rustc-env={key}={value}");
        }
    }
}
