//! Opening the authorization URL for the user

use std::io;
use std::process::{Command, Stdio};

use pkce_auth::BrowserLauncher;
use reqwest::Url;

/// Prints the URL, then asks the desktop to open it.
pub struct SystemBrowser;

/// Prints the URL only (`--no-browser`).
pub struct ManualBrowser;

impl BrowserLauncher for SystemBrowser {
    fn open(&self, url: &Url) -> io::Result<()> {
        print_url(url);
        let (program, args) = launcher_command(std::env::consts::OS);
        Command::new(program)
            .args(args)
            .arg(url.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map(drop)
    }
}

impl BrowserLauncher for ManualBrowser {
    fn open(&self, url: &Url) -> io::Result<()> {
        print_url(url);
        Ok(())
    }
}

fn print_url(url: &Url) {
    eprintln!("\nOpen this URL in your browser to continue:\n\n  {url}\n");
}

/// Program and leading arguments that open a URL on `os`.
fn launcher_command(os: &str) -> (&'static str, &'static [&'static str]) {
    match os {
        "macos" => ("open", &[]),
        "windows" => ("rundll32", &["url.dll,FileProtocolHandler"]),
        _ => ("xdg-open", &[]),
    }
}
