//! Locating a Chromium-family executable.

use std::path::{Path, PathBuf};

#[cfg(target_os = "windows")]
const EXECUTABLE_NAMES: &[&str] = &["chrome.exe", "chromium.exe", "msedge.exe"];

#[cfg(target_os = "macos")]
const EXECUTABLE_NAMES: &[&str] = &["chromium", "google-chrome", "chrome"];

#[cfg(all(unix, not(target_os = "macos")))]
const EXECUTABLE_NAMES: &[&str] = &[
    "chromium",
    "chromium-browser",
    "google-chrome",
    "google-chrome-stable",
];

/// First Chromium found on `PATH`, then in the platform's install locations.
#[must_use]
pub fn find_chromium() -> Option<PathBuf> {
    let on_path = std::env::var_os("PATH").and_then(|paths| {
        std::env::split_paths(&paths).find_map(|dir| first_existing(&dir, EXECUTABLE_NAMES))
    });
    on_path.or_else(|| install_locations().into_iter().find(|p| p.is_file()))
}

fn first_existing(dir: &Path, names: &[&str]) -> Option<PathBuf> {
    names
        .iter()
        .map(|name| dir.join(name))
        .find(|candidate| candidate.is_file())
}

#[cfg(target_os = "windows")]
fn install_locations() -> Vec<PathBuf> {
    const SUFFIXES: [&str; 3] = [
        "Google/Chrome/Application/chrome.exe",
        "Chromium/Application/chrome.exe",
        "Microsoft/Edge/Application/msedge.exe",
    ];
    ["ProgramFiles", "ProgramFiles(x86)", "LOCALAPPDATA"]
        .into_iter()
        .filter_map(std::env::var_os)
        .flat_map(|base| SUFFIXES.map(|suffix| PathBuf::from(&base).join(suffix)))
        .collect()
}

#[cfg(target_os = "macos")]
fn install_locations() -> Vec<PathBuf> {
    [
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        "/opt/homebrew/bin/chromium",
        "/usr/local/bin/chromium",
    ]
    .into_iter()
    .map(PathBuf::from)
    .collect()
}

#[cfg(all(unix, not(target_os = "macos")))]
fn install_locations() -> Vec<PathBuf> {
    [
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/snap/bin/chromium",
    ]
    .into_iter()
    .map(PathBuf::from)
    .collect()
}
