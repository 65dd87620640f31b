use std::sync::Arc;
use std::time::Duration as StdDuration;

use auth_core::config::{AuthConfig, LockoutConfig, OtpConfig, TokenConfig};
use auth_core::models::RegisterRequest;
use auth_core::services::AuthService;
use auth_core::store::InMemoryUserStore;
use notify_core::{DispatchConfig, Dispatcher, MockMailTransport};

pub struct TestHarness {
    pub auth: AuthService,
    pub store: Arc<InMemoryUserStore>,
    pub transport: Arc<MockMailTransport>,
    pub dispatcher: Dispatcher,
}

pub fn test_config() -> AuthConfig {
    AuthConfig {
        token: TokenConfig {
            secret: "integration-test-secret-key".to_string(),
            ttl_minutes: 600,
        },
        otp: OtpConfig {
            min_resend_seconds: 60,
            window_seconds: 3600,
            max_per_window: 5,
            verify_ttl_minutes: 5,
            reset_ttl_minutes: 10,
        },
        lockout: LockoutConfig {
            max_failed_logins: 5,
            lockout_minutes: 15,
        },
        require_verified_email: true,
        password_min_length: 8,
        store_timeout: StdDuration::from_secs(5),
    }
}

fn fast_dispatch_config() -> DispatchConfig {
    DispatchConfig {
        workers: 2,
        initial_backoff: StdDuration::from_millis(10),
        max_backoff: StdDuration::from_millis(100),
        backoff_multiplier: 2.0,
        add_jitter: false,
        delivery_timeout: StdDuration::from_secs(2),
    }
}

pub fn harness() -> TestHarness {
    harness_with(test_config(), MockMailTransport::succeeding())
}

pub fn harness_with(config: AuthConfig, transport: MockMailTransport) -> TestHarness {
    dotenvy::dotenv().ok();
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info")
        .try_init();

    let store = Arc::new(InMemoryUserStore::new());
    let transport = Arc::new(transport);
    let dispatcher = Dispatcher::start(transport.clone(), fast_dispatch_config());
    let auth = AuthService::new(store.clone(), dispatcher.clone(), config)
        .expect("failed to build auth service");

    TestHarness {
        auth,
        store,
        transport,
        dispatcher,
    }
}

pub fn register_request(email: &str, password: &str) -> RegisterRequest {
    RegisterRequest {
        email: email.to_string(),
        password: password.to_string(),
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
    }
}

impl TestHarness {
    /// Register an identity and walk it through code verification.
    pub async fn register_and_verify(&self, email: &str, password: &str) {
        self.auth
            .register(register_request(email, password))
            .await
            .expect("registration failed");
        let code = self.stored_code(email).await;
        self.auth
            .verify_code(email, &code)
            .await
            .expect("verification failed");
    }

    /// Fetch the active code straight from the store, the way a test reads
    /// the database instead of an inbox.
    pub async fn stored_code(&self, email: &str) -> String {
        use auth_core::store::UserStore;
        self.store
            .find_by_email(&email.trim().to_lowercase())
            .await
            .expect("store lookup failed")
            .expect("user missing")
            .otp_code
            .expect("no active code")
    }

    /// Read the stored user record for direct assertions and clock rewinds.
    pub async fn stored_user(&self, email: &str) -> auth_core::models::User {
        use auth_core::store::UserStore;
        self.store
            .find_by_email(&email.trim().to_lowercase())
            .await
            .expect("store lookup failed")
            .expect("user missing")
    }

    /// Overwrite the stored record, e.g. after simulating elapsed time.
    pub async fn put_user(&self, user: &auth_core::models::User) {
        use auth_core::store::UserStore;
        self.store.update(user).await.expect("store update failed");
    }
}
