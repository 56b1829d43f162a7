mod sms;

pub use sms::SmsClient;
