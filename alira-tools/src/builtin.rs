//! Side-effect free sample tools shipped with the runtime.

use serde_json::{Value, json};

use crate::discovery::StaticSource;
use crate::registry::{ToolDefinition, ToolError, ToolFuture, ToolResult};

/// Name of the weather lookup tool.
pub const WEATHER_TOOL: &str = "getWeather";
/// Name of the horoscope tool.
pub const HOROSCOPE_TOOL: &str = "get_horoscope";

/// Returns a discovery source holding every built-in tool.
#[must_use]
pub fn general_tools() -> StaticSource {
    StaticSource::new("general-tools", vec![weather(), horoscope()])
}

/// Mock weather lookup for a location.
#[must_use]
pub fn weather() -> ToolDefinition {
    ToolDefinition::builder(WEATHER_TOOL)
        .description("Get current weather information for a specific location.")
        .instructions("Use this tool to get weather information for users based on their location.")
        .schema(json!({
            "type": "object",
            "properties": {
                "location": {
                    "type": "string",
                    "description": "The city or location to get weather for (e.g., 'New York', 'London', 'Tokyo')"
                },
                "units": {
                    "type": "string",
                    "enum": ["celsius", "fahrenheit"],
                    "description": "Temperature units (default: celsius)",
                    "default": "celsius"
                }
            },
            "required": ["location"]
        }))
        .binding(run_weather)
        .build()
}

fn run_weather(parameters: Value) -> ToolFuture {
    Box::pin(async move { weather_report(&parameters) })
}

fn weather_report(parameters: &Value) -> ToolResult<Value> {
    let location = required_str(parameters, "location")?;
    let units = parameters
        .get("units")
        .and_then(Value::as_str)
        .unwrap_or("celsius");
    let temperature = match units {
        "celsius" => "22°C",
        "fahrenheit" => "72°F",
        other => {
            return Err(ToolError::execution(format!(
                "unsupported units `{other}`"
            )));
        }
    };

    Ok(json!({
        "success": true,
        "operation": WEATHER_TOOL,
        "location": location,
        "units": units,
        "weather": {
            "location": location,
            "temperature": temperature,
            "condition": "Partly cloudy",
            "humidity": "65%",
            "windSpeed": "10 mph",
            "description": format!(
                "The weather in {location} is partly cloudy with a temperature of {temperature}."
            ),
        },
        "message": "Weather information retrieved successfully",
    }))
}

/// Daily horoscope for an astrological sign.
#[must_use]
pub fn horoscope() -> ToolDefinition {
    ToolDefinition::builder(HOROSCOPE_TOOL)
        .description("Get today's horoscope for an astrological sign.")
        .instructions(
            "Use this tool to get horoscope predictions for users based on their astrological sign.",
        )
        .schema(json!({
            "type": "object",
            "properties": {
                "sign": {
                    "type": "string",
                    "description": "An astrological sign like Taurus or Aquarius"
                }
            },
            "required": ["sign"]
        }))
        .binding(run_horoscope)
        .build()
}

fn run_horoscope(parameters: Value) -> ToolFuture {
    Box::pin(async move { horoscope_reading(&parameters) })
}

fn horoscope_reading(parameters: &Value) -> ToolResult<Value> {
    let sign = required_str(parameters, "sign")?;
    let reading = reading_for(&sign.to_lowercase()).map_or_else(
        || {
            format!(
                "{sign}: The stars are aligning in mysterious ways. Trust your instincts and be open to unexpected opportunities."
            )
        },
        str::to_owned,
    );

    Ok(json!({
        "success": true,
        "operation": HOROSCOPE_TOOL,
        "sign": sign,
        "horoscope": reading,
        "message": "Horoscope retrieved successfully",
    }))
}

fn reading_for(sign: &str) -> Option<&'static str> {
    let reading = match sign {
        "aries" => "Aries: Your bold nature will lead you to start a new adventure that involves fire, excitement, and possibly a dragon.",
        "taurus" => "Taurus: Your practical approach will help you build something beautiful that will last for generations.",
        "gemini" => "Gemini: Your dual nature will help you see both sides of an important decision that's coming your way.",
        "cancer" => "Cancer: Your caring nature will be rewarded when someone you helped returns the favor in an unexpected way.",
        "leo" => "Leo: Your natural leadership will shine when you're called upon to guide others through a challenging situation.",
        "virgo" => "Virgo: Your attention to detail will help you solve a puzzle that has stumped everyone else.",
        "libra" => "Libra: Your sense of balance will help you mediate a conflict and bring harmony to a difficult situation.",
        "scorpio" => "Scorpio: Your intensity will help you uncover a secret that changes everything you thought you knew.",
        "sagittarius" => "Sagittarius: Your adventurous spirit will lead you to a journey that expands your horizons beyond imagination.",
        "capricorn" => "Capricorn: Your determination will help you achieve a goal that seemed impossible to others.",
        "aquarius" => "Aquarius: Next Tuesday you will befriend a baby otter and discover a hidden talent for underwater basket weaving.",
        "pisces" => "Pisces: Your intuition will guide you to a life-changing decision involving a mysterious stranger and a talking fish.",
        _ => return None,
    };
    Some(reading)
}

fn required_str(parameters: &Value, key: &str) -> ToolResult<String> {
    parameters
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| ToolError::execution(format!("missing required parameter `{key}`")))
}
