//! One operation per signup form step.
//!
//! Each step composes element lookup (retried), humanlike cursor motion,
//! paced typing, and inter-action pauses. Selectors target the signup
//! flow this tool automates; the navigation route goes through a Google
//! search the way a person would arrive.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::debug;

use super::machine::WorkflowError;
use crate::browser::{DelayBand, HumanInput, PageDriver, TypingSpeed};
use crate::motion::MotionConfig;
use crate::retry::RetryPolicy;

const GOOGLE_URL: &str = "https://www.google.com/";
const SEARCH_QUERY: &str = "create account riot games";
const SEARCH_INPUT: &str = "#APjFqb";
const SEARCH_BUTTON_TEXT: &str = "Google Search";
const SIGNUP_RESULT_TEXT: &str = "Create a Riot Account";
const CREATE_ACCOUNT_TEXT: &str = "Create account";

const EMAIL_INPUT: &str = "[data-testid='riot-signup-email']";
const USERNAME_INPUT: &str = "[data-testid='riot-signup-username']";
const SIGNUP_SUBMIT: &str = "[data-testid='btn-signup-submit']";
const OTP_SUBMIT: &str = "[data-testid='btn-otp-submit']";
const OTP_RESEND: &str = "[data-testid='otp-resend']";
const PASSWORD_INPUTS: [&str; 2] = [
    "[data-testid='input-password']",
    "[data-testid='password-confirm']",
];
const BIRTHDATE_FIELDS: [&str; 3] = [
    "[data-testid='riot-signup-birthdate-month']",
    "[data-testid='riot-signup-birthdate-day']",
    "[data-testid='riot-signup-birthdate-year']",
];
const MARKETING_CHECKBOXES: [&str; 2] = ["#newsletter", "#thirdpartycomms"];
const TOS_AREA: &str = "#tos-scrollable-area";
const TOS_CHECKBOX: &str = "#tos-checkbox";
const TOS_ACCEPT: &str = "[data-testid='btn-accept-tos']";

const CURSOR_INJECT_JS: &str = "(function(){if(document.getElementById('__debug_cursor__'))return;const c=document.createElement('div');c.id='__debug_cursor__';c.style.cssText='position:fixed;width:12px;height:12px;background:rgba(255,50,50,0.8);border:2px solid white;border-radius:50%;pointer-events:none;z-index:999999;transform:translate(-50%,-50%);box-shadow:0 0 4px rgba(0,0,0,0.5);transition:none';document.body.appendChild(c)})();";

/// Step library bound to one browser session.
pub struct SignupPage {
    human: HumanInput,
    debug_cursor: bool,
}

impl SignupPage {
    pub fn new(
        driver: Arc<dyn PageDriver>,
        motion_config: MotionConfig,
        speed: f64,
        retry_policy: RetryPolicy,
        debug_cursor: bool,
    ) -> Self {
        Self {
            human: HumanInput::new(driver, motion_config, speed, retry_policy),
            debug_cursor,
        }
    }

    pub fn driver(&self) -> &Arc<dyn PageDriver> {
        self.human.driver()
    }

    /// Overlay a visible dot tracking the synthetic cursor. Best-effort
    /// debug aid; failures are swallowed.
    async fn inject_debug_cursor(&self) {
        if !self.debug_cursor {
            return;
        }
        if self.human.driver().evaluate(CURSOR_INJECT_JS).await.is_err() {
            return;
        }
        let cursor = self.human.cursor().await;
        let move_js = format!(
            "(function(x,y){{const c=document.getElementById('__debug_cursor__');if(c){{c.style.left=x+'px';c.style.top=y+'px'}}}})({},{});",
            cursor.x, cursor.y
        );
        let _ = self.human.driver().evaluate(&move_js).await;
    }

    /// Reach the signup form the way a person would: search Google and
    /// follow the result chain.
    pub async fn navigate_to_signup(&self) -> Result<(), WorkflowError> {
        self.human.driver().navigate(GOOGLE_URL).await?;
        self.human.pause(DelayBand::Page).await;
        self.inject_debug_cursor().await;

        let search_input = self.human.select(SEARCH_INPUT).await?;
        self.human.pause(DelayBand::Short).await;
        self.human
            .type_text(&search_input, SEARCH_QUERY, TypingSpeed::Normal)
            .await?;
        self.human.pause(DelayBand::Short).await;

        let search_button = self.human.find_text(SEARCH_BUTTON_TEXT).await?;
        self.human.pause(DelayBand::Action).await;
        self.human.click(&search_button).await?;
        self.human.pause(DelayBand::Page).await;
        self.inject_debug_cursor().await;

        self.human.pause(DelayBand::Thinking).await;
        let signup_link = self.human.find_text(SIGNUP_RESULT_TEXT).await?;
        self.human.pause(DelayBand::Action).await;
        self.human.click(&signup_link).await?;
        self.human.pause(DelayBand::Page).await;
        self.inject_debug_cursor().await;

        self.human.pause(DelayBand::Thinking).await;
        let create_link = self.human.find_text(CREATE_ACCOUNT_TEXT).await?;
        self.human.pause(DelayBand::Action).await;
        self.human.click(&create_link).await?;
        self.human.pause(DelayBand::Page).await;
        self.inject_debug_cursor().await;

        Ok(())
    }

    pub async fn enter_email(&self, email: &str) -> Result<(), WorkflowError> {
        let email_input = self.human.select(EMAIL_INPUT).await?;
        self.human.pause(DelayBand::Short).await;
        self.human
            .type_text(&email_input, email, TypingSpeed::Normal)
            .await?;
        self.human.pause(DelayBand::Short).await;
        Ok(())
    }

    /// Untick pre-checked marketing consent boxes. Best-effort: missing
    /// checkboxes or failed clicks are ignored.
    pub async fn uncheck_marketing_boxes(&self) {
        for selector in MARKETING_CHECKBOXES {
            let Ok(checkbox) = self.human.select(selector).await else {
                continue;
            };
            let checked_js = format!(
                "(function(){{const el=document.querySelector('{selector}');return el?el.checked:false}})()"
            );
            let checked = match self.human.apply(&checked_js).await {
                Ok(value) => value.as_bool().unwrap_or(false),
                Err(error) => {
                    debug!(selector, %error, "marketing checkbox probe failed");
                    continue;
                }
            };
            if checked {
                self.human.pause(DelayBand::Short).await;
                if self.human.click(&checkbox).await.is_err() {
                    continue;
                }
                self.human.pause(DelayBand::Micro).await;
            }
        }
    }

    /// Click the shared signup submit button (email, birthdate, username
    /// and password screens all use it).
    pub async fn submit_signup(&self) -> Result<(), WorkflowError> {
        let submit = self.human.select(SIGNUP_SUBMIT).await?;
        self.human.pause(DelayBand::Action).await;
        self.human.click(&submit).await?;
        self.human.pause(DelayBand::Page).await;
        Ok(())
    }

    /// Type the 6-digit code into the per-digit inputs, slower on the
    /// first couple of digits the way a person reads the code in chunks.
    pub async fn enter_otp(&self, code: &str) -> Result<(), WorkflowError> {
        if code.len() != 6 || !code.chars().all(|c| c.is_ascii_digit()) {
            return Err(WorkflowError::InvalidCode {
                code: code.to_string(),
            });
        }
        self.human.pause(DelayBand::Short).await;
        for (i, digit) in code.chars().enumerate() {
            let selector = format!("[data-testid='otp-input'] div:nth-of-type({}) > input", i + 1);
            let input = self.human.select(&selector).await?;
            self.human
                .driver()
                .type_text(&input, &digit.to_string())
                .await?;
            let seconds = {
                let mut rng = rand::rng();
                let mut delay = rng.random_range(0.12..=0.28);
                if i < 2 {
                    delay += rng.random_range(0.05..=0.12);
                }
                delay
            };
            tokio::time::sleep(Duration::from_secs_f64(seconds)).await;
        }
        self.human.pause(DelayBand::Short).await;
        Ok(())
    }

    pub async fn submit_otp(&self) -> Result<(), WorkflowError> {
        let submit = self.human.select(OTP_SUBMIT).await?;
        self.human.pause(DelayBand::Action).await;
        self.human.click(&submit).await?;
        self.human.pause(DelayBand::Page).await;
        Ok(())
    }

    pub async fn click_resend_otp(&self) -> Result<(), WorkflowError> {
        let resend = self.human.select(OTP_RESEND).await?;
        self.human.pause(DelayBand::Action).await;
        self.human.click(&resend).await?;
        self.human.pause(DelayBand::Thinking).await;
        Ok(())
    }

    /// Fill the three birthdate fields from an `MM/DD/YYYY` string.
    pub async fn enter_birthdate(&self, birthdate: &str) -> Result<(), WorkflowError> {
        let parts: Vec<&str> = birthdate.split('/').collect();
        if parts.len() != 3 {
            return Err(WorkflowError::InvalidBirthdate {
                value: birthdate.to_string(),
            });
        }
        for (selector, value) in BIRTHDATE_FIELDS.iter().zip(parts) {
            let input = self.human.select(selector).await?;
            self.human.pause(DelayBand::Short).await;
            self.human
                .type_text(&input, value, TypingSpeed::Fast)
                .await?;
            self.human.pause(DelayBand::Short).await;
        }
        Ok(())
    }

    pub async fn enter_username(&self, username: &str) -> Result<(), WorkflowError> {
        let username_input = self.human.select(USERNAME_INPUT).await?;
        self.human.pause(DelayBand::Short).await;
        self.human
            .type_text(&username_input, username, TypingSpeed::Normal)
            .await?;
        self.human.pause(DelayBand::Short).await;
        Ok(())
    }

    /// Password plus confirmation, typed carefully.
    pub async fn enter_password(&self, password: &str) -> Result<(), WorkflowError> {
        for selector in PASSWORD_INPUTS {
            let input = self.human.select(selector).await?;
            self.human.pause(DelayBand::Short).await;
            self.human
                .type_text(&input, password, TypingSpeed::Slow)
                .await?;
            self.human.pause(DelayBand::Short).await;
        }
        Ok(())
    }

    /// Scroll through the terms, tick the consent box, accept.
    pub async fn accept_terms(&self) -> Result<(), WorkflowError> {
        let tos_area = self.human.select(TOS_AREA).await?;
        self.human.pause(DelayBand::Short).await;
        self.human.click(&tos_area).await?;
        self.human.pause(DelayBand::Short).await;
        self.human.pause(DelayBand::Thinking).await;

        let scroll_js = format!(
            "(function(){{const el=document.querySelector('{TOS_AREA}');if(el){{el.scrollTop=el.scrollHeight}}}})()"
        );
        self.human.apply(&scroll_js).await?;
        self.human.pause(DelayBand::Short).await;

        let checkbox = self.human.select(TOS_CHECKBOX).await?;
        self.human.pause(DelayBand::Action).await;
        self.human.click(&checkbox).await?;
        self.human.pause(DelayBand::Short).await;

        let accept = self.human.select(TOS_ACCEPT).await?;
        self.human.pause(DelayBand::Action).await;
        self.human.click(&accept).await?;
        self.human.pause(DelayBand::Page).await;
        Ok(())
    }

    /// Best-effort failure screenshot keyed by account identity.
    pub async fn capture_failure_screenshot(&self, username: &str) {
        let path = PathBuf::from(format!("error_{username}.png"));
        match self.human.driver().screenshot(&path).await {
            Ok(()) => debug!(path = %path.display(), "saved failure screenshot"),
            Err(error) => debug!(%error, "failure screenshot could not be saved"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::driver::{ElementBox, ElementHandle};
    use crate::browser::DriveError;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Driver that records interactions and answers every lookup.
    #[derive(Default)]
    struct RecordingDriver {
        keys: AtomicUsize,
    }

    #[async_trait]
    impl PageDriver for RecordingDriver {
        async fn navigate(&self, _url: &str) -> Result<(), DriveError> {
            Ok(())
        }
        async fn select(&self, selector: &str) -> Result<ElementHandle, DriveError> {
            Ok(ElementHandle {
                id: 0,
                query: selector.to_string(),
            })
        }
        async fn find_text(&self, query: &str) -> Result<ElementHandle, DriveError> {
            Ok(ElementHandle {
                id: 0,
                query: query.to_string(),
            })
        }
        async fn click(&self, _element: &ElementHandle) -> Result<(), DriveError> {
            Ok(())
        }
        async fn type_text(&self, _element: &ElementHandle, _text: &str) -> Result<(), DriveError> {
            self.keys.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn geometry(&self, _element: &ElementHandle) -> Result<ElementBox, DriveError> {
            Ok(ElementBox {
                x: 10.0,
                y: 10.0,
                width: 50.0,
                height: 20.0,
            })
        }
        async fn evaluate(&self, _script: &str) -> Result<serde_json::Value, DriveError> {
            Ok(serde_json::Value::Bool(false))
        }
        async fn current_url(&self) -> Result<String, DriveError> {
            Ok(String::new())
        }
        async fn screenshot(&self, _path: &Path) -> Result<(), DriveError> {
            Ok(())
        }
        async fn dispatch_move_event(&self, _x: f64, _y: f64) -> Result<(), DriveError> {
            Ok(())
        }
        async fn close(&self) {}
    }

    fn page(driver: Arc<RecordingDriver>) -> SignupPage {
        SignupPage::new(
            driver,
            MotionConfig::default(),
            2.0,
            RetryPolicy::default(),
            false,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn otp_rejects_wrong_lengths_before_touching_the_page() {
        let driver = Arc::new(RecordingDriver::default());
        let signup = page(driver.clone());

        for bad in ["", "12345", "1234567"] {
            let error = signup.enter_otp(bad).await.unwrap_err();
            assert!(matches!(error, WorkflowError::InvalidCode { .. }));
        }
        assert!(matches!(
            signup.enter_otp("12a456").await.unwrap_err(),
            WorkflowError::InvalidCode { .. }
        ));
        assert_eq!(driver.keys.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn otp_accepts_six_digits_and_types_each_one() {
        let driver = Arc::new(RecordingDriver::default());
        let signup = page(driver.clone());

        signup.enter_otp("123456").await.unwrap();
        assert_eq!(driver.keys.load(Ordering::SeqCst), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn birthdate_requires_three_slash_components() {
        let driver = Arc::new(RecordingDriver::default());
        let signup = page(driver.clone());

        let error = signup.enter_birthdate("13/2000").await.unwrap_err();
        assert!(matches!(error, WorkflowError::InvalidBirthdate { .. }));

        signup.enter_birthdate("02/29/2000").await.unwrap();
        assert!(driver.keys.load(Ordering::SeqCst) >= "02292000".len());
    }
}
