use crate::fake_browser::{numbered_diagrams, FakeElement, FakeSite, BASE_URL};
use eview_extractor::driver::{Browser, BrowserLauncher, BrowserOptions, Locator};
use eview_extractor::navigation::{
    css_candidates, first_displayed, first_present, next_button_selectors, project_locators,
    stay_signed_in_selectors, EMAIL_SELECTORS, PASSWORD_SELECTORS, SSO_BUTTON_XPATH,
};

async fn signed_in_form(site: &FakeSite) -> crate::fake_browser::FakeBrowser {
    let browser = site
        .launcher()
        .launch(&BrowserOptions::default())
        .await
        .unwrap();
    browser.goto(BASE_URL).await.unwrap();
    let (_, sso) = first_present(&browser, &[Locator::xpath(SSO_BUTTON_XPATH)])
        .await
        .unwrap()
        .unwrap();
    browser.click(&sso).await.unwrap();
    browser
}

#[tokio::test]
async fn test_email_field_resolves_through_first_candidate() {
    let site = FakeSite::new("P-1000", numbered_diagrams(1));
    let browser = signed_in_form(&site).await;

    let found = first_displayed(&browser, &css_candidates(EMAIL_SELECTORS))
        .await
        .unwrap();

    assert_eq!(found, Some((0, FakeElement::EmailInput)));
    assert_eq!(
        first_displayed(&browser, &css_candidates(PASSWORD_SELECTORS))
            .await
            .unwrap(),
        None
    );
}

#[tokio::test]
async fn test_stay_signed_in_prompt_matches_localized_candidate() {
    let site = FakeSite::new("P-1000", numbered_diagrams(1));
    let browser = signed_in_form(&site).await;

    for _ in 0..2 {
        let (_, submit) = first_displayed(&browser, &css_candidates(next_button_selectors()))
            .await
            .unwrap()
            .unwrap();
        browser.click(&submit).await.unwrap();
    }

    let found = first_displayed(&browser, &css_candidates(stay_signed_in_selectors()))
        .await
        .unwrap();
    assert_eq!(found, Some((1, FakeElement::StayButton)));
}

#[tokio::test]
async fn test_project_lookup_prefers_exact_text() {
    let site = FakeSite::new("P-1000", numbered_diagrams(1));
    let browser = signed_in_form(&site).await;
    for _ in 0..2 {
        let (_, submit) = first_displayed(&browser, &css_candidates(next_button_selectors()))
            .await
            .unwrap()
            .unwrap();
        browser.click(&submit).await.unwrap();
    }
    let (_, stay) = first_displayed(&browser, &css_candidates(stay_signed_in_selectors()))
        .await
        .unwrap()
        .unwrap();
    browser.click(&stay).await.unwrap();

    let found = first_present(&browser, &project_locators("P-1000"))
        .await
        .unwrap();
    assert_eq!(found, Some((0, FakeElement::ProjectCell)));

    let missing = first_present(&browser, &project_locators("P-2000"))
        .await
        .unwrap();
    assert_eq!(missing, None);
}
