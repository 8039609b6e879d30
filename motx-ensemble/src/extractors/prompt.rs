//! Extraction prompt shared by every vision backend

/// Instruction sent alongside the screenshot
pub const EXTRACTION_PROMPT: &str = r#"You are an expert at extracting MOT reminder data from garage management software screenshots with extreme precision.

Analyze this screenshot and extract the following information:

1. Vehicle Registration Number (UK format: AB12 CDE, A123 BCD, etc.)
2. MOT Expiry Date (DD/MM/YYYY format)
3. Vehicle Make
4. Vehicle Model
5. Customer Name
6. Customer Phone Number
7. Customer Email Address

CRITICAL REQUIREMENTS:
- UK registration numbers follow specific patterns (AB12 CDE, A123 BCD, ABC 123D, 1234 AB)
- Dates must be in DD/MM/YYYY format
- If any field is unclear, missing, or you are not confident, use "NOT_FOUND"
- Provide a confidence score (0.0-1.0) for each field based on clarity and certainty
- Identify the garage management software being used if possible

Look carefully at the entire screenshot. Data might be in tables, forms, or scattered across the interface.

Return ONLY a valid JSON object with this exact structure:
{
    "registration": "extracted_registration_or_NOT_FOUND",
    "mot_expiry": "DD/MM/YYYY_or_NOT_FOUND",
    "make": "extracted_make_or_NOT_FOUND",
    "model": "extracted_model_or_NOT_FOUND",
    "customer_name": "extracted_name_or_NOT_FOUND",
    "customer_phone": "extracted_phone_or_NOT_FOUND",
    "customer_email": "extracted_email_or_NOT_FOUND",
    "confidence_scores": {
        "registration": 0.0,
        "mot_expiry": 0.0,
        "make": 0.0,
        "model": 0.0,
        "customer_name": 0.0,
        "customer_phone": 0.0,
        "customer_email": 0.0
    },
    "software_detected": "detected_software_name_or_UNKNOWN"
}

Do not include any text before or after the JSON object."#;
