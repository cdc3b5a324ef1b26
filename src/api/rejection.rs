use std::convert::Infallible;

use warp::{
    reject::{
        InvalidHeader, InvalidQuery, LengthRequired, MethodNotAllowed, MissingHeader,
        PayloadTooLarge, UnsupportedMediaType,
    },
    reply::Response,
    Rejection, Reply,
};

use crate::error::{Error, HtmlError};

/// Turns whatever no route accepted into a JSON error body.
pub async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    let error = if let Some(e) = err.find::<Error>() {
        e.clone()
    } else if err.is_not_found() {
        HtmlError::NotFound.default()
    } else if err.find::<MethodNotAllowed>().is_some() {
        HtmlError::MethodNotAllowed.default()
    } else if err.find::<PayloadTooLarge>().is_some() {
        HtmlError::PayloadTooLarge.default()
    } else if err.find::<LengthRequired>().is_some() {
        HtmlError::LengthRequired.default()
    } else if err.find::<UnsupportedMediaType>().is_some() {
        HtmlError::UnsupportedMediaType.default()
    } else if let Some(e) = err.find::<InvalidQuery>() {
        HtmlError::InvalidRequest.new(&e.to_string())
    } else if let Some(e) = err.find::<MissingHeader>() {
        HtmlError::InvalidRequest.new(&e.to_string())
    } else if let Some(e) = err.find::<InvalidHeader>() {
        HtmlError::InvalidRequest.new(&e.to_string())
    } else {
        log::error!("Unhandled rejection: {err:?}");
        HtmlError::InternalServerError.default()
    };

    Ok(error.into_response())
}
