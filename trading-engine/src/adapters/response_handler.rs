use crate::error::TransportError;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: i64,
    #[serde(default)]
    msg: String,
}

pub async fn handle_response<T: DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, TransportError> {
    let status = resp.status();
    let body = resp.text().await?;
    parse_body(status.as_u16(), &body)
}

pub fn parse_body<T: DeserializeOwned>(status: u16, body: &str) -> Result<T, TransportError> {
    if !(200..300).contains(&status) {
        return Err(decode_error(status, body));
    }

    let json: Value = serde_json::from_str(body)?;

    // Some endpoints report errors with a 200 status and a {code, msg} body
    if let Some(code) = json.get("code").and_then(Value::as_i64) {
        if code != 200 && json.get("msg").is_some() {
            return Err(decode_error(status, body));
        }
    }

    Ok(serde_json::from_value(json)?)
}

pub fn decode_error(status: u16, body: &str) -> TransportError {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(err) => {
            let message = if err.msg.is_empty() {
                map_error_code(err.code)
            } else {
                err.msg
            };
            TransportError::Api {
                code: err.code,
                message,
            }
        }
        Err(e) => {
            debug!("Undecodable error body ({}): {}", status, e);
            match status {
                404 => TransportError::NotFound(body.to_string()),
                _ => TransportError::Status {
                    status,
                    message: body.to_string(),
                },
            }
        }
    }
}

pub fn map_error_code(code: i64) -> String {
    match code {
        -1000 => "Unknown error".to_string(),
        -1001 => "Disconnected".to_string(),
        -1002 => "Unauthorized".to_string(),
        -1003 => "Too many requests".to_string(),
        -1013 => "Invalid quantity".to_string(),
        -1021 => "Timestamp outside recvWindow".to_string(),
        -1022 => "Invalid signature".to_string(),
        -1102 => "Mandatory parameter missing".to_string(),
        -1111 => "Precision over maximum".to_string(),
        -1121 => "Invalid symbol".to_string(),
        -2011 => "Unknown order".to_string(),
        -2013 => "Order does not exist".to_string(),
        -2014 => "Bad API key format".to_string(),
        -2015 => "Invalid API key, IP or permissions".to_string(),
        -2019 => "Margin is insufficient".to_string(),
        -2021 => "Order would immediately trigger".to_string(),
        -4003 => "Quantity less than or equal to zero".to_string(),
        -4014 => "Price not increased by tick size".to_string(),
        -4164 => "Order notional too small".to_string(),
        _ => format!("Error code: {}", code),
    }
}
