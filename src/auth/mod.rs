//! User accounts, passwords, cookie sessions and the handlers for signing up and logging in.

mod cookie;
mod current_user;
mod log_in;
mod log_out;
mod middleware;
mod one_time_code;
mod password;
mod sign_up;
mod token;
mod user;

pub use cookie::{DEFAULT_COOKIE_DURATION, invalidate_auth_cookie, set_auth_cookie};
pub use current_user::get_current_user;
pub use log_in::post_log_in;
pub use log_out::post_log_out;
pub use middleware::auth_guard;
pub use one_time_code::{
    CodeSender, LogCodeSender, OneTimeCode, OneTimeCodeStore, request_one_time_code,
    verify_one_time_code,
};
pub use password::{PasswordHash, ValidatedPassword};
pub use sign_up::sign_up;
pub(crate) use token::Token;
pub use user::{
    User, UserID, UserProfile, count_users, create_user, create_user_table, get_user_by_email,
    get_user_by_id, update_password,
};
pub(crate) use user::map_user_row;

#[cfg(test)]
pub(crate) use cookie::COOKIE_TOKEN;
#[cfg(test)]
pub(crate) use one_time_code::RecordingCodeSender;
