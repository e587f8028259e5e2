//! Selector surface of the sign-in pages and the eVIEW frontend
//!
//! Candidate lists are ordered; the first candidate that resolves to a
//! displayed element wins. The Microsoft sign-in page renders localized
//! labels, so both English and German variants are listed.

use crate::driver::{Browser, DriverResult, Locator};

/// Email input of the Microsoft sign-in form
pub const EMAIL_SELECTORS: &[&str] = &[
    "input[type='email']",
    "input[name='loginfmt']",
    "input[id='i0116']",
    "input[id='email']",
    "input[placeholder*='Email']",
    "input[placeholder*='E-Mail']",
    "input[name='username']",
];

/// Password input of the Microsoft sign-in form
pub const PASSWORD_SELECTORS: &[&str] = &[
    "input[type='password']",
    "input[name='passwd']",
    "input[id='i0118']",
    "input[id='passwordInput']",
    "input[placeholder*='Password']",
    "input[placeholder*='Passwort']",
];

/// Every submit-like control of the sign-in flow
pub const SUBMIT_SELECTORS: &[&str] = &[
    "input[type='submit']",
    "input[id='idSIButton9']",
    "button[type='submit']",
    "input[value='Next']",
    "input[value='Weiter']",
    "input[value='Sign in']",
    "input[value='Anmelden']",
    "input[value='Yes']",
    "input[value='Ja']",
    "button[id='idSIButton9']",
];

/// Elements whose text or title names the SSO provider
pub const SSO_BUTTON_XPATH: &str = "//*[contains(text(), 'Microsoft') or contains(text(), 'microsoft') or contains(@title, 'Microsoft')]";

/// Substring of the SSO host's URL
pub const SSO_HOST_MARKER: &str = "login.microsoft";

/// Substring every eVIEW URL carries
pub const APP_URL_MARKER: &str = "eview";

/// Lowercased labels of the project "Open" button
pub const OPEN_BUTTON_LABELS: &[&str] = &["open", "öffnen"];

pub const MENU_BUTTON_TAG: &str = "eplan-icon-button";
pub const MENU_BUTTON_MARKER: &str = "ev-btn-page-more";
pub const MENU_OPEN_CLASS: &str = "fl-pop-up-open";
pub const LIST_VIEW_ITEM_TAG: &str = "eplan-dropdown-item";
pub const LIST_VIEW_MARKER: &str = "ev-page-list-view-btn";

/// Controls that advance from the email step
pub fn next_button_selectors() -> &'static [&'static str] {
    &SUBMIT_SELECTORS[..6]
}

/// Controls that confirm the "stay signed in?" prompt
pub fn stay_signed_in_selectors() -> &'static [&'static str] {
    &SUBMIT_SELECTORS[SUBMIT_SELECTORS.len() - 4..]
}

/// Wraps CSS selectors as locators, keeping their order
pub fn css_candidates(selectors: &[&str]) -> Vec<Locator> {
    selectors.iter().map(|s| Locator::css(*s)).collect()
}

/// Quotes `value` as an XPath 1.0 string literal
///
/// XPath has no escape sequences, so a value holding both quote kinds is
/// assembled with `concat()`.
pub fn xpath_literal(value: &str) -> String {
    if !value.contains('\'') {
        format!("'{}'", value)
    } else if !value.contains('"') {
        format!("\"{}\"", value)
    } else {
        let parts: Vec<String> = value
            .split('\'')
            .map(|part| format!("'{}'", part))
            .collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}

/// Strategies for locating a project in the project list, most specific first
pub fn project_locators(project_id: &str) -> Vec<Locator> {
    let literal = xpath_literal(project_id);
    vec![
        Locator::xpath(format!("//*[text()={}]", literal)),
        Locator::xpath(format!("//td[contains(text(), {})]", literal)),
        Locator::xpath(format!("//span[contains(text(), {})]", literal)),
        Locator::xpath(format!("//div[contains(text(), {})]", literal)),
        Locator::xpath(format!("//a[contains(text(), {})]", literal)),
        Locator::xpath(format!("//tr[contains(., {})]", literal)),
    ]
}

/// Returns true if a lowercased button label reads "open"
pub fn is_open_label(label: &str) -> bool {
    OPEN_BUTTON_LABELS.iter().any(|l| label.contains(l))
}

/// Resolves the first candidate with a displayed match
///
/// Returns the index of the winning candidate along with the element.
/// Lookup failures of a single candidate fall through to the next one;
/// transport failures abort the search.
pub async fn first_displayed<B: Browser>(
    browser: &B,
    candidates: &[Locator],
) -> DriverResult<Option<(usize, B::Element)>> {
    for (index, locator) in candidates.iter().enumerate() {
        let elements = match browser.find_all(locator).await {
            Ok(elements) => elements,
            Err(e) if e.is_transient() => return Err(e),
            Err(_) => continue,
        };

        for element in elements {
            if browser.is_displayed(&element).await.unwrap_or(false) {
                return Ok(Some((index, element)));
            }
        }
    }

    Ok(None)
}

/// Resolves the first candidate with any match, displayed or not
pub async fn first_present<B: Browser>(
    browser: &B,
    candidates: &[Locator],
) -> DriverResult<Option<(usize, B::Element)>> {
    for (index, locator) in candidates.iter().enumerate() {
        match browser.find_all(locator).await {
            Ok(elements) => {
                if let Some(element) = elements.into_iter().next() {
                    return Ok(Some((index, element)));
                }
            }
            Err(e) if e.is_transient() => return Err(e),
            Err(_) => continue,
        }
    }

    Ok(None)
}
