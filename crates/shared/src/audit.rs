//! Password/MFA policy audit payload and its scored result.
//!
//! The payload is always fully populated. Leaves are addressed through
//! [`NumericField`] and [`ToggleField`] instead of dynamic keys, and every
//! `with_*` update returns a new payload with exactly one leaf changed.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{
    domain::{Environment, RiskLevel, Severity},
    error::FieldKeyError,
};

/// Numeric form value as typed into a number input.
///
/// Non-numeric text coerces to NaN and is forwarded as-is; the scoring
/// service owns validation. NaN and infinities go over the wire as `null`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FormNumber(f64);

impl FormNumber {
    pub const fn new(value: f64) -> Self {
        Self(value)
    }

    pub fn coerce(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() {
            return Self(0.0);
        }
        Self(raw.parse::<f64>().unwrap_or(f64::NAN))
    }

    pub fn value(self) -> f64 {
        self.0
    }

    pub fn is_suspicious(self) -> bool {
        !self.0.is_finite() || self.0 < 0.0
    }
}

impl From<u32> for FormNumber {
    fn from(value: u32) -> Self {
        Self(f64::from(value))
    }
}

const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

impl Serialize for FormNumber {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let value = self.0;
        if !value.is_finite() {
            serializer.serialize_none()
        } else if value.fract() == 0.0 && value.abs() <= MAX_EXACT_INTEGER {
            serializer.serialize_i64(value as i64)
        } else {
            serializer.serialize_f64(value)
        }
    }
}

impl<'de> Deserialize<'de> for FormNumber {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<f64>::deserialize(deserializer)?;
        Ok(Self(value.unwrap_or(f64::NAN)))
    }
}

impl fmt::Display for FormNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_nan() {
            f.write_str("NaN")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PasswordPolicy {
    pub min_length: FormNumber,
    pub require_upper: bool,
    pub require_lower: bool,
    pub require_digit: bool,
    pub require_symbol: bool,
    pub history_prevent_reuse: FormNumber,
    pub lockout_threshold: FormNumber,
    pub lockout_window_minutes: FormNumber,
    pub lockout_duration_minutes: FormNumber,
    pub dictionary_check_enabled: bool,
    pub blocklist_enabled: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 12.into(),
            require_upper: true,
            require_lower: true,
            require_digit: true,
            require_symbol: false,
            history_prevent_reuse: 5.into(),
            lockout_threshold: 10.into(),
            lockout_window_minutes: 15.into(),
            lockout_duration_minutes: 15.into(),
            dictionary_check_enabled: true,
            blocklist_enabled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MfaFactors {
    pub sms: bool,
    pub totp_app: bool,
    pub fido2_webauthn: bool,
    pub push_approval: bool,
    pub email_otp: bool,
}

impl Default for MfaFactors {
    fn default() -> Self {
        Self {
            sms: false,
            totp_app: true,
            fido2_webauthn: false,
            push_approval: false,
            email_otp: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MfaEnforcement {
    pub required_for_all_users: bool,
    pub required_for_admins: bool,
    pub conditional_by_risk: bool,
    pub number_matching_enabled: bool,
    pub device_binding_enabled: bool,
    pub push_rate_limit_per_minute: FormNumber,
    pub mfa_bypass_days_after_password_reset: FormNumber,
}

impl Default for MfaEnforcement {
    fn default() -> Self {
        Self {
            required_for_all_users: true,
            required_for_admins: true,
            conditional_by_risk: false,
            number_matching_enabled: true,
            device_binding_enabled: true,
            push_rate_limit_per_minute: 2.into(),
            mfa_bypass_days_after_password_reset: 0.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditPayload {
    pub policy: PasswordPolicy,
    pub mfa_factors: MfaFactors,
    pub mfa_enforcement: MfaEnforcement,
    pub environment: Environment,
    pub user_count: FormNumber,
}

impl Default for AuditPayload {
    fn default() -> Self {
        Self {
            policy: PasswordPolicy::default(),
            mfa_factors: MfaFactors::default(),
            mfa_enforcement: MfaEnforcement::default(),
            environment: Environment::Prod,
            user_count: 500.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormSection {
    Policy,
    MfaFactors,
    MfaEnforcement,
    Deployment,
}

impl FormSection {
    pub const ALL: &'static [FormSection] = &[
        FormSection::Policy,
        FormSection::MfaFactors,
        FormSection::MfaEnforcement,
        FormSection::Deployment,
    ];

    pub fn title(self) -> &'static str {
        match self {
            FormSection::Policy => "Password policy",
            FormSection::MfaFactors => "MFA factors",
            FormSection::MfaEnforcement => "MFA enforcement",
            FormSection::Deployment => "Deployment",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumericField {
    MinLength,
    HistoryPreventReuse,
    LockoutThreshold,
    LockoutWindowMinutes,
    LockoutDurationMinutes,
    PushRateLimitPerMinute,
    MfaBypassDaysAfterPasswordReset,
    UserCount,
}

impl NumericField {
    pub const ALL: &'static [NumericField] = &[
        NumericField::MinLength,
        NumericField::HistoryPreventReuse,
        NumericField::LockoutThreshold,
        NumericField::LockoutWindowMinutes,
        NumericField::LockoutDurationMinutes,
        NumericField::PushRateLimitPerMinute,
        NumericField::MfaBypassDaysAfterPasswordReset,
        NumericField::UserCount,
    ];

    pub fn key(self) -> &'static str {
        match self {
            NumericField::MinLength => "min_length",
            NumericField::HistoryPreventReuse => "history_prevent_reuse",
            NumericField::LockoutThreshold => "lockout_threshold",
            NumericField::LockoutWindowMinutes => "lockout_window_minutes",
            NumericField::LockoutDurationMinutes => "lockout_duration_minutes",
            NumericField::PushRateLimitPerMinute => "push_rate_limit_per_minute",
            NumericField::MfaBypassDaysAfterPasswordReset => {
                "mfa_bypass_days_after_password_reset"
            }
            NumericField::UserCount => "user_count",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            NumericField::MinLength => "Min length",
            NumericField::HistoryPreventReuse => "History (prevent reuse)",
            NumericField::LockoutThreshold => "Lockout threshold (attempts)",
            NumericField::LockoutWindowMinutes => "Lockout window (minutes)",
            NumericField::LockoutDurationMinutes => "Duration (minutes)",
            NumericField::PushRateLimitPerMinute => "Push rate / min",
            NumericField::MfaBypassDaysAfterPasswordReset => "MFA bypass days after PWD reset",
            NumericField::UserCount => "User count",
        }
    }

    pub fn section(self) -> FormSection {
        match self {
            NumericField::MinLength
            | NumericField::HistoryPreventReuse
            | NumericField::LockoutThreshold
            | NumericField::LockoutWindowMinutes
            | NumericField::LockoutDurationMinutes => FormSection::Policy,
            NumericField::PushRateLimitPerMinute
            | NumericField::MfaBypassDaysAfterPasswordReset => FormSection::MfaEnforcement,
            NumericField::UserCount => FormSection::Deployment,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToggleField {
    RequireUpper,
    RequireLower,
    RequireDigit,
    RequireSymbol,
    DictionaryCheckEnabled,
    BlocklistEnabled,
    Sms,
    TotpApp,
    Fido2Webauthn,
    PushApproval,
    EmailOtp,
    RequiredForAllUsers,
    RequiredForAdmins,
    ConditionalByRisk,
    NumberMatchingEnabled,
    DeviceBindingEnabled,
}

impl ToggleField {
    pub const ALL: &'static [ToggleField] = &[
        ToggleField::RequireUpper,
        ToggleField::RequireLower,
        ToggleField::RequireDigit,
        ToggleField::RequireSymbol,
        ToggleField::DictionaryCheckEnabled,
        ToggleField::BlocklistEnabled,
        ToggleField::Sms,
        ToggleField::TotpApp,
        ToggleField::Fido2Webauthn,
        ToggleField::PushApproval,
        ToggleField::EmailOtp,
        ToggleField::RequiredForAllUsers,
        ToggleField::RequiredForAdmins,
        ToggleField::ConditionalByRisk,
        ToggleField::NumberMatchingEnabled,
        ToggleField::DeviceBindingEnabled,
    ];

    pub fn key(self) -> &'static str {
        match self {
            ToggleField::RequireUpper => "require_upper",
            ToggleField::RequireLower => "require_lower",
            ToggleField::RequireDigit => "require_digit",
            ToggleField::RequireSymbol => "require_symbol",
            ToggleField::DictionaryCheckEnabled => "dictionary_check_enabled",
            ToggleField::BlocklistEnabled => "blocklist_enabled",
            ToggleField::Sms => "sms",
            ToggleField::TotpApp => "totp_app",
            ToggleField::Fido2Webauthn => "fido2_webauthn",
            ToggleField::PushApproval => "push_approval",
            ToggleField::EmailOtp => "email_otp",
            ToggleField::RequiredForAllUsers => "required_for_all_users",
            ToggleField::RequiredForAdmins => "required_for_admins",
            ToggleField::ConditionalByRisk => "conditional_by_risk",
            ToggleField::NumberMatchingEnabled => "number_matching_enabled",
            ToggleField::DeviceBindingEnabled => "device_binding_enabled",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ToggleField::RequireUpper => "Upper",
            ToggleField::RequireLower => "Lower",
            ToggleField::RequireDigit => "Digit",
            ToggleField::RequireSymbol => "Symbol",
            ToggleField::DictionaryCheckEnabled => "Dict check",
            ToggleField::BlocklistEnabled => "Blocklist",
            ToggleField::Sms => "SMS",
            ToggleField::TotpApp => "Authenticator app (TOTP)",
            ToggleField::Fido2Webauthn => "WebAuthn (FIDO2)",
            ToggleField::PushApproval => "Push approval",
            ToggleField::EmailOtp => "Email OTP",
            ToggleField::RequiredForAllUsers => "Require for all users",
            ToggleField::RequiredForAdmins => "Require for admins",
            ToggleField::ConditionalByRisk => "Conditional by risk",
            ToggleField::NumberMatchingEnabled => "Number matching",
            ToggleField::DeviceBindingEnabled => "Device binding",
        }
    }

    pub fn section(self) -> FormSection {
        match self {
            ToggleField::RequireUpper
            | ToggleField::RequireLower
            | ToggleField::RequireDigit
            | ToggleField::RequireSymbol
            | ToggleField::DictionaryCheckEnabled
            | ToggleField::BlocklistEnabled => FormSection::Policy,
            ToggleField::Sms
            | ToggleField::TotpApp
            | ToggleField::Fido2Webauthn
            | ToggleField::PushApproval
            | ToggleField::EmailOtp => FormSection::MfaFactors,
            ToggleField::RequiredForAllUsers
            | ToggleField::RequiredForAdmins
            | ToggleField::ConditionalByRisk
            | ToggleField::NumberMatchingEnabled
            | ToggleField::DeviceBindingEnabled => FormSection::MfaEnforcement,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AuditEdit {
    Number(NumericField, FormNumber),
    Toggle(ToggleField, bool),
    Environment(Environment),
}

impl FromStr for AuditEdit {
    type Err = FieldKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (key, value) = s
            .split_once('=')
            .ok_or_else(|| FieldKeyError::MissingValue(s.to_string()))?;
        let key = key.trim();

        if key == "environment" {
            return Ok(AuditEdit::Environment(value.parse()?));
        }
        if let Some(field) = NumericField::ALL.iter().find(|f| f.key() == key) {
            return Ok(AuditEdit::Number(*field, FormNumber::coerce(value)));
        }
        if let Some(field) = ToggleField::ALL.iter().find(|f| f.key() == key) {
            let enabled = match value.trim().to_ascii_lowercase().as_str() {
                "true" | "on" | "yes" | "1" => true,
                "false" | "off" | "no" | "0" => false,
                _ => {
                    return Err(FieldKeyError::InvalidToggle {
                        field: field.key(),
                        value: value.to_string(),
                    })
                }
            };
            return Ok(AuditEdit::Toggle(*field, enabled));
        }
        Err(FieldKeyError::UnknownField(key.to_string()))
    }
}

impl AuditPayload {
    pub fn number(&self, field: NumericField) -> FormNumber {
        match field {
            NumericField::MinLength => self.policy.min_length,
            NumericField::HistoryPreventReuse => self.policy.history_prevent_reuse,
            NumericField::LockoutThreshold => self.policy.lockout_threshold,
            NumericField::LockoutWindowMinutes => self.policy.lockout_window_minutes,
            NumericField::LockoutDurationMinutes => self.policy.lockout_duration_minutes,
            NumericField::PushRateLimitPerMinute => {
                self.mfa_enforcement.push_rate_limit_per_minute
            }
            NumericField::MfaBypassDaysAfterPasswordReset => {
                self.mfa_enforcement.mfa_bypass_days_after_password_reset
            }
            NumericField::UserCount => self.user_count,
        }
    }

    pub fn toggle(&self, field: ToggleField) -> bool {
        match field {
            ToggleField::RequireUpper => self.policy.require_upper,
            ToggleField::RequireLower => self.policy.require_lower,
            ToggleField::RequireDigit => self.policy.require_digit,
            ToggleField::RequireSymbol => self.policy.require_symbol,
            ToggleField::DictionaryCheckEnabled => self.policy.dictionary_check_enabled,
            ToggleField::BlocklistEnabled => self.policy.blocklist_enabled,
            ToggleField::Sms => self.mfa_factors.sms,
            ToggleField::TotpApp => self.mfa_factors.totp_app,
            ToggleField::Fido2Webauthn => self.mfa_factors.fido2_webauthn,
            ToggleField::PushApproval => self.mfa_factors.push_approval,
            ToggleField::EmailOtp => self.mfa_factors.email_otp,
            ToggleField::RequiredForAllUsers => self.mfa_enforcement.required_for_all_users,
            ToggleField::RequiredForAdmins => self.mfa_enforcement.required_for_admins,
            ToggleField::ConditionalByRisk => self.mfa_enforcement.conditional_by_risk,
            ToggleField::NumberMatchingEnabled => self.mfa_enforcement.number_matching_enabled,
            ToggleField::DeviceBindingEnabled => self.mfa_enforcement.device_binding_enabled,
        }
    }

    pub fn with_number(&self, field: NumericField, value: FormNumber) -> Self {
        let mut next = self.clone();
        *next.number_mut(field) = value;
        next
    }

    pub fn with_toggle(&self, field: ToggleField, enabled: bool) -> Self {
        let mut next = self.clone();
        *next.toggle_mut(field) = enabled;
        next
    }

    pub fn with_environment(&self, environment: Environment) -> Self {
        Self {
            environment,
            ..self.clone()
        }
    }

    pub fn apply(&self, edit: AuditEdit) -> Self {
        match edit {
            AuditEdit::Number(field, value) => self.with_number(field, value),
            AuditEdit::Toggle(field, enabled) => self.with_toggle(field, enabled),
            AuditEdit::Environment(environment) => self.with_environment(environment),
        }
    }

    pub fn suspicious_numbers(&self) -> Vec<NumericField> {
        NumericField::ALL
            .iter()
            .copied()
            .filter(|field| self.number(*field).is_suspicious())
            .collect()
    }

    fn number_mut(&mut self, field: NumericField) -> &mut FormNumber {
        match field {
            NumericField::MinLength => &mut self.policy.min_length,
            NumericField::HistoryPreventReuse => &mut self.policy.history_prevent_reuse,
            NumericField::LockoutThreshold => &mut self.policy.lockout_threshold,
            NumericField::LockoutWindowMinutes => &mut self.policy.lockout_window_minutes,
            NumericField::LockoutDurationMinutes => &mut self.policy.lockout_duration_minutes,
            NumericField::PushRateLimitPerMinute => {
                &mut self.mfa_enforcement.push_rate_limit_per_minute
            }
            NumericField::MfaBypassDaysAfterPasswordReset => {
                &mut self.mfa_enforcement.mfa_bypass_days_after_password_reset
            }
            NumericField::UserCount => &mut self.user_count,
        }
    }

    fn toggle_mut(&mut self, field: ToggleField) -> &mut bool {
        match field {
            ToggleField::RequireUpper => &mut self.policy.require_upper,
            ToggleField::RequireLower => &mut self.policy.require_lower,
            ToggleField::RequireDigit => &mut self.policy.require_digit,
            ToggleField::RequireSymbol => &mut self.policy.require_symbol,
            ToggleField::DictionaryCheckEnabled => &mut self.policy.dictionary_check_enabled,
            ToggleField::BlocklistEnabled => &mut self.policy.blocklist_enabled,
            ToggleField::Sms => &mut self.mfa_factors.sms,
            ToggleField::TotpApp => &mut self.mfa_factors.totp_app,
            ToggleField::Fido2Webauthn => &mut self.mfa_factors.fido2_webauthn,
            ToggleField::PushApproval => &mut self.mfa_factors.push_approval,
            ToggleField::EmailOtp => &mut self.mfa_factors.email_otp,
            ToggleField::RequiredForAllUsers => &mut self.mfa_enforcement.required_for_all_users,
            ToggleField::RequiredForAdmins => &mut self.mfa_enforcement.required_for_admins,
            ToggleField::ConditionalByRisk => &mut self.mfa_enforcement.conditional_by_risk,
            ToggleField::NumberMatchingEnabled => {
                &mut self.mfa_enforcement.number_matching_enabled
            }
            ToggleField::DeviceBindingEnabled => &mut self.mfa_enforcement.device_binding_enabled,
        }
    }
}

fn default_finding_score() -> f64 {
    0.5
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub id: String,
    pub title: String,
    pub severity: Severity,
    #[serde(default = "default_finding_score")]
    pub score: f64,
    #[serde(default)]
    pub description: String,
    pub remediation: String,
    #[serde(default)]
    pub standard_refs: Vec<String>,
}

/// Scored audit answer; `overall_score` is a proportion in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditResult {
    pub overall_score: f64,
    pub risk_level: RiskLevel,
    pub summary: String,
    #[serde(default)]
    pub findings: Vec<Finding>,
}
