//! The paths of the JSON API.
//!
//! For endpoints that take a parameter, e.g., '/api/expenses/{id}', use [format_endpoint].

/// The route for creating an account.
pub const SIGN_UP: &str = "/api/auth/signup";
/// The route for logging in with an email and password.
pub const LOG_IN: &str = "/api/auth/login";
/// The route for logging out the current user.
pub const LOG_OUT: &str = "/api/auth/logout";
/// The route for requesting a one-time log-in code.
pub const REQUEST_ONE_TIME_CODE: &str = "/api/auth/request-otp";
/// The route for logging in with a one-time code.
pub const VERIFY_ONE_TIME_CODE: &str = "/api/auth/verify-otp";

/// The route for listing and recording the current user's expenses.
pub const EXPENSES: &str = "/api/expenses";
/// The route for editing a single expense.
pub const EXPENSE: &str = "/api/expenses/{id}";
/// The route for deleting a single expense.
pub const DELETE_EXPENSE: &str = "/api/expenses/delete/{id}";
/// The route for every user's expenses grouped by month.
pub const MONTHLY_SUMMARY: &str = "/api/expenses/summary/monthly";
/// The route for the name of the current user.
pub const CURRENT_USER: &str = "/api/expenses/api/user";

/// Replace the parameter in `endpoint_path` with `id`.
///
/// A parameter starts with a left brace and ends with the next right brace, e.g. '{id}' in
/// '/api/expenses/{id}'. Only the first parameter is replaced.
///
/// If no parameter is found in `endpoint_path`, the original path is returned.
pub fn format_endpoint(endpoint_path: &str, id: i64) -> String {
    let Some(start) = endpoint_path.find('{') else {
        return endpoint_path.to_owned();
    };

    let end = endpoint_path[start..]
        .find('}')
        .map_or(endpoint_path.len(), |offset| start + offset + 1);

    format!("{}{id}{}", &endpoint_path[..start], &endpoint_path[end..])
}
