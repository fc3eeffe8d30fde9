//! Media type inference for body inputs.

use crate::body::BodyInit;

pub const TEXT_PLAIN_UTF8: &str = "text/plain;charset=UTF-8";
pub const FORM_URLENCODED_UTF8: &str = "application/x-www-form-urlencoded;charset=UTF-8";

/// The `Content-Type` a message should advertise for `init`, if any.
///
/// Raw bytes and streams carry no type of their own. A blob's type is used
/// only when it is non-empty.
pub fn extract_content_type(init: &BodyInit) -> Option<String> {
    match init {
        BodyInit::Empty => None,
        BodyInit::Text(_) => Some(TEXT_PLAIN_UTF8.to_owned()),
        BodyInit::Form(_) => Some(FORM_URLENCODED_UTF8.to_owned()),
        BodyInit::Blob(blob) => match blob.content_type() {
            "" => None,
            ty => Some(ty.to_owned()),
        },
        BodyInit::Multipart(encoder) => {
            Some(format!("multipart/form-data;boundary={}", encoder.boundary()))
        }
        BodyInit::Bytes(_) | BodyInit::Stream(_) | BodyInit::Reader(_) => None,
        BodyInit::Body(body) => body.inferred_content_type().map(str::to_owned),
    }
}
