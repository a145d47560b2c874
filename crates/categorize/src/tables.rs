//! Rule tables consumed by [`MerchantExtractor`](crate::MerchantExtractor) and
//! [`RuleCatalog`](crate::RuleCatalog).
//!
//! Tables are plain values: the built-in set comes from `RuleTables::default()`
//! and a TOML config can extend or replace it (see [`crate::config`]).

use serde::{Deserialize, Serialize};

/// How a matched standardization pattern becomes a merchant key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Standardize {
    /// Replace with a fixed canonical name.
    Literal(String),
    /// Title-case capture group 1, or the whole match when the pattern has
    /// no group. Used to strip payment-processor prefixes like `SQ *`.
    TitleCase,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandardizationRule {
    pub pattern: String,
    #[serde(default)]
    pub priority: i32,
    pub standardize: Standardize,
}

/// Exact canonical merchant name -> default categorization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerchantCategory {
    pub merchant: String,
    pub category: String,
    #[serde(default)]
    pub subcategory: String,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountFilter {
    #[default]
    Any,
    Positive,
    Negative,
}

/// Substring fallback: any of `terms` appearing in the description selects
/// the rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermRule {
    pub terms: Vec<String>,
    pub category: String,
    #[serde(default)]
    pub subcategory: String,
    pub reason: String,
    #[serde(default)]
    pub amount: AmountFilter,
}

/// An ordered group of term rules for one domain (income, dining, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermTable {
    pub domain: String,
    pub rules: Vec<TermRule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleTables {
    pub standardization: Vec<StandardizationRule>,
    pub merchant_categories: Vec<MerchantCategory>,
    pub term_tables: Vec<TermTable>,
}

impl Default for RuleTables {
    fn default() -> Self {
        RuleTables {
            standardization: default_standardization(),
            merchant_categories: default_merchant_categories(),
            term_tables: default_term_tables(),
        }
    }
}

fn literal(pattern: &str, name: &str) -> StandardizationRule {
    StandardizationRule {
        pattern: pattern.to_string(),
        priority: 0,
        standardize: Standardize::Literal(name.to_string()),
    }
}

fn title_case(pattern: &str) -> StandardizationRule {
    StandardizationRule {
        pattern: pattern.to_string(),
        priority: 0,
        standardize: Standardize::TitleCase,
    }
}

fn default_standardization() -> Vec<StandardizationRule> {
    vec![
        // Processor prefixes: keep the merchant after the asterisk.
        title_case(r"^SQ\s*\*\s*(.+)$"),
        title_case(r"^TST\s*\*\s*(.+)$"),
        title_case(r"^PAYPAL\s*\*\s*(.+)$"),
        title_case(r"^VCO\s*\*\s*(.+)$"),
        title_case(r"^CS\s*\*\s*(.+)$"),
        // Coffee and quick service
        literal(r"\bSTARBUCKS", "Starbucks"),
        literal(r"\bDUNKIN\b", "Dunkin'"),
        literal(r"\bMCDONALD'?S?\b", "McDonald's"),
        literal(r"\bCHIPOTLE\b", "Chipotle"),
        literal(r"\bPANERA\b", "Panera Bread"),
        literal(r"\bCULVER'?S\b", "Culver's"),
        literal(r"\bPORTILLO'?S\b", "Portillo's"),
        literal(r"\bSWEETGREEN\b", "Sweetgreen"),
        literal(r"\bUBER\s*\*?\s*EATS\b", "Uber Eats"),
        literal(r"\bDOORDASH\b", "DoorDash"),
        literal(r"\bGRUBHUB\b", "Grubhub"),
        // Fuel
        literal(r"\bCOSTCO\s*GAS\b", "Costco Gas"),
        literal(r"^BP\b", "BP"),
        literal(r"\bSHELL\b", "Shell"),
        literal(r"\bEXXON", "Exxon"),
        literal(r"\bMOBIL\b", "Mobil"),
        literal(r"\bCHEVRON\b", "Chevron"),
        literal(r"\bCITGO\b", "Citgo"),
        literal(r"\bSPEEDWAY\b", "Speedway"),
        literal(r"\bMARATHON\s*PETRO", "Marathon"),
        literal(r"\bTHORNTON'?S\b", "Thornton's"),
        literal(r"\bCASEY'?S\b", "Casey's General Store"),
        // Getting around
        literal(r"\bUBER\b", "Uber"),
        literal(r"\bLYFT\b", "Lyft"),
        literal(r"\bI-?PASS\b|\bTOLLWAY\b", "Illinois Tollway"),
        literal(r"\bE-?Z\s*PASS\b", "E-ZPass"),
        literal(r"\bSPOTHERO\b", "SpotHero"),
        literal(r"\bSOUTHWES(?:T\s*AIR\w*)?\b", "Southwest Airlines"),
        literal(r"\bHAMPTON\s*INN\b", "Hampton Inn"),
        // Groceries
        literal(r"\bWHOLEFDS\b|\bWHOLE\s*FOODS\b", "Whole Foods"),
        literal(r"\bTRADER\s*JOE", "Trader Joe's"),
        literal(r"\bMARIANO'?S\b", "Mariano's"),
        literal(r"\bJEWEL(?:[- ]?OSCO)?\b", "Jewel-Osco"),
        literal(r"\bALDI\b", "Aldi"),
        literal(r"\bKROGER\b", "Kroger"),
        literal(r"\bCOSTCO\b", "Costco"),
        // Retail
        literal(r"\bWAL-?MART\b|\bWM\s*SUPERCENTER\b", "Walmart"),
        literal(r"\bTARGET\b", "Target"),
        literal(r"\bKINDLE\s*SVCS\b", "Amazon Kindle"),
        literal(r"\bPRIME\s*VIDEO\b", "Prime Video"),
        literal(r"\bAMAZON|\bAMZN\b", "Amazon"),
        literal(r"\bHOME\s*DEPOT\b", "The Home Depot"),
        literal(r"\bLOWE'?S\b", "Lowe's"),
        literal(r"\bMENARDS\b", "Menards"),
        literal(r"\bHOME\s*GOODS\b", "HomeGoods"),
        literal(r"\bTJ\s*MAXX\b", "TJ Maxx"),
        literal(r"\bBEST\s*BUY\b", "Best Buy"),
        literal(r"\bAPPLE\.COM\b", "Apple"),
        // Health
        literal(r"\bCVS\b", "CVS Pharmacy"),
        literal(r"\bWALGREENS?\b", "Walgreens"),
        literal(r"\bNORTHWESTERN\s*MUTUAL\b", "Northwestern Mutual"),
        literal(r"\bNORTHWESTERN\s*(?:MY\s*CHART|MEDICINE|MEDICAL)\b", "Northwestern Medicine"),
        // Subscriptions
        literal(r"\bNETFLIX", "Netflix"),
        literal(r"\bSPOTIFY", "Spotify"),
        literal(r"\bHULU\b", "Hulu"),
        literal(r"\bDISNEY\s*(?:PLUS|\+)", "Disney+"),
        literal(r"\bAUDIBLE\b", "Audible"),
        // Utilities
        literal(r"\bVERIZON|\bVZWRLSS\b", "Verizon Wireless"),
        literal(r"\bCOMCAST\b|\bXFINITY\b", "Xfinity"),
        literal(r"\bCOMED\b|\bCOMMONWEALTH\s*EDISON\b", "ComEd"),
        literal(r"\bNICOR\b", "Nicor Gas"),
        // Person-to-person and wallets
        literal(r"\bZELLE\b", "Zelle"),
        literal(r"\bVENMO\b", "Venmo"),
        literal(r"\bCASH\s*APP\b", "Cash App"),
        literal(r"\bPAYPAL\b", "PayPal"),
    ]
}

fn merchant(name: &str, category: &str, subcategory: &str, reason: &str) -> MerchantCategory {
    MerchantCategory {
        merchant: name.to_string(),
        category: category.to_string(),
        subcategory: subcategory.to_string(),
        reason: reason.to_string(),
    }
}

fn default_merchant_categories() -> Vec<MerchantCategory> {
    const FOOD: &str = "Food & Dining";
    const TRANSPORT: &str = "Transportation";
    const SHOPPING: &str = "Shopping";
    const HEALTH: &str = "Health & Medical";
    const FUN: &str = "Entertainment";
    const HOUSING: &str = "Housing";

    let mut table = vec![
        merchant("Starbucks", FOOD, "Coffee/Tea", "Starbucks identified as major coffee chain"),
        merchant("Dunkin'", FOOD, "Coffee/Tea", "Dunkin' identified as coffee and donut chain"),
        merchant("Sweetgreen", FOOD, "Restaurants", "Sweetgreen identified as restaurant"),
        merchant("Uber Eats", FOOD, "Food Delivery", "Uber Eats identified as food delivery service"),
        merchant("DoorDash", FOOD, "Food Delivery", "DoorDash identified as food delivery service"),
        merchant("Grubhub", FOOD, "Food Delivery", "Grubhub identified as food delivery service"),
        merchant("Costco", FOOD, "Groceries", "Costco identified as warehouse club"),
        merchant("Uber", TRANSPORT, "Ride Share", "Uber identified as ride share"),
        merchant("Lyft", TRANSPORT, "Ride Share", "Lyft identified as ride share"),
        merchant("Illinois Tollway", TRANSPORT, "Tolls", "Illinois Tollway identified as toll authority"),
        merchant("E-ZPass", TRANSPORT, "Tolls", "E-ZPass identified as toll authority"),
        merchant("SpotHero", TRANSPORT, "Parking", "SpotHero identified as parking service"),
        merchant("Southwest Airlines", "Travel", "Airfare", "Southwest Airlines identified as airline"),
        merchant("Hampton Inn", "Travel", "Hotel", "Hampton Inn identified as hotel"),
        merchant("Walmart", SHOPPING, "General Merchandise", "Walmart identified as general merchandise retailer"),
        merchant("Target", SHOPPING, "General Merchandise", "Target identified as general merchandise retailer"),
        merchant("Amazon", SHOPPING, "Online Shopping", "Amazon identified as online retailer"),
        merchant("Amazon Kindle", FUN, "Books/Media", "Amazon Kindle identified as digital books"),
        merchant("Audible", FUN, "Books/Media", "Audible identified as audiobook service"),
        merchant("Prime Video", FUN, "Subscriptions", "Prime Video identified as streaming service"),
        merchant("HomeGoods", SHOPPING, "Home Goods", "HomeGoods identified as home goods retailer"),
        merchant("TJ Maxx", SHOPPING, "Clothing", "TJ Maxx identified as clothing retailer"),
        merchant("Best Buy", SHOPPING, "Electronics", "Best Buy identified as electronics retailer"),
        merchant("Apple", SHOPPING, "Electronics", "Apple identified as electronics and services"),
        merchant("CVS Pharmacy", HEALTH, "Pharmacy", "CVS identified as pharmacy"),
        merchant("Walgreens", HEALTH, "Pharmacy", "Walgreens identified as pharmacy"),
        merchant("Northwestern Medicine", HEALTH, "Doctor Visits", "Northwestern Medicine identified as medical provider"),
        merchant("Northwestern Mutual", "Insurance", "Life Insurance", "Northwestern Mutual identified as life insurer"),
        merchant("Verizon Wireless", HOUSING, "Utilities", "Verizon identified as phone service"),
        merchant("Xfinity", HOUSING, "Utilities", "Xfinity identified as internet and cable provider"),
        merchant("ComEd", HOUSING, "Utilities", "ComEd identified as electric utility"),
        merchant("Nicor Gas", HOUSING, "Utilities", "Nicor identified as gas utility"),
        merchant("Zelle", "Transfers", "Person-to-Person", "Zelle identified as person-to-person transfer"),
        merchant("Venmo", "Transfers", "Person-to-Person", "Venmo identified as person-to-person transfer"),
        merchant("Cash App", "Transfers", "Person-to-Person", "Cash App identified as person-to-person transfer"),
        merchant("PayPal", "Transfers", "Online Payment", "PayPal identified as online payment processor"),
    ];

    for name in ["McDonald's", "Chipotle", "Panera Bread", "Culver's", "Portillo's"] {
        table.push(merchant(
            name,
            FOOD,
            "Fast Food",
            &format!("{name} identified as fast food chain"),
        ));
    }
    for name in [
        "BP", "Shell", "Exxon", "Mobil", "Chevron", "Citgo", "Speedway", "Marathon",
        "Thornton's", "Casey's General Store", "Costco Gas",
    ] {
        table.push(merchant(
            name,
            TRANSPORT,
            "Gas",
            &format!("{name} identified as gas station"),
        ));
    }
    for name in ["Whole Foods", "Trader Joe's", "Mariano's", "Jewel-Osco", "Aldi", "Kroger"] {
        table.push(merchant(
            name,
            FOOD,
            "Groceries",
            &format!("{name} identified as grocery store"),
        ));
    }
    for name in ["The Home Depot", "Lowe's", "Menards"] {
        table.push(merchant(
            name,
            SHOPPING,
            "Home Improvement",
            &format!("{name} identified as home improvement store"),
        ));
    }
    for name in ["Netflix", "Spotify", "Hulu", "Disney+"] {
        table.push(merchant(
            name,
            FUN,
            "Subscriptions",
            &format!("{name} identified as streaming subscription"),
        ));
    }
    table
}

fn rule(terms: &[&str], category: &str, subcategory: &str, reason: &str) -> TermRule {
    TermRule {
        terms: terms.iter().map(|t| t.to_string()).collect(),
        category: category.to_string(),
        subcategory: subcategory.to_string(),
        reason: reason.to_string(),
        amount: AmountFilter::Any,
    }
}

fn incoming(terms: &[&str], category: &str, subcategory: &str, reason: &str) -> TermRule {
    TermRule {
        amount: AmountFilter::Positive,
        ..rule(terms, category, subcategory, reason)
    }
}

fn table(domain: &str, rules: Vec<TermRule>) -> TermTable {
    TermTable {
        domain: domain.to_string(),
        rules,
    }
}

fn default_term_tables() -> Vec<TermTable> {
    vec![
        table(
            "income",
            vec![
                incoming(
                    &["DIRECT DEP", "DIRECTDEP", "PAYROLL", "SALARY", "PAYCHECK"],
                    "Income",
                    "Salary",
                    "Payroll deposit",
                ),
                incoming(&["DIVIDEND", "INTEREST"], "Income", "Investment Income", "Investment income"),
                incoming(&["DEPOSIT"], "Income", "Other Income", "Incoming deposit"),
            ],
        ),
        table(
            "transfers",
            vec![
                rule(
                    &["CREDIT CRD", "CRD AUTOPAY", "PAYMENT THANK YOU", "CREDIT CARD PAYMENT"],
                    "Financial",
                    "Credit Card Payment",
                    "Credit card payment",
                ),
                rule(
                    &["ONLINE TRANSFER", "WIRE TRANSFER", "TRANSFER"],
                    "Transfers",
                    "Internal Transfer",
                    "Account transfer",
                ),
            ],
        ),
        table(
            "cash",
            vec![rule(&["ATM", "CASH WITHDRAWAL"], "Cash & ATM", "", "Cash withdrawal")],
        ),
        table(
            "bills",
            vec![
                rule(&["MORTGAGE"], "Housing", "Mortgage/Rent", "Mortgage payment"),
                rule(&["ELECTRIC", "POWER CO"], "Housing", "Utilities", "Electric utility bill"),
                rule(&["GAS UTIL", "NATURAL GAS"], "Housing", "Utilities", "Gas utility bill"),
                rule(&["WATER BILL", "WATER DEPT", "SEWER"], "Housing", "Utilities", "Water utility bill"),
                rule(&["INTERNET", "CABLE"], "Housing", "Utilities", "Internet or cable bill"),
                rule(&["WIRELESS", "TELEPHONE"], "Housing", "Utilities", "Phone bill"),
                rule(&["INSURANCE"], "Insurance", "", "Insurance premium"),
            ],
        ),
        table(
            "transportation",
            vec![
                rule(&["GAS STATION", "FUEL", "GASOLINE"], "Transportation", "Gas", "Fuel purchase"),
                rule(&["TOLL"], "Transportation", "Tolls", "Toll charge"),
                rule(&["PARKING"], "Transportation", "Parking", "Parking charge"),
                rule(&["TAXI", "RIDESHARE"], "Transportation", "Ride Share", "Ride service"),
            ],
        ),
        table(
            "health",
            vec![
                rule(&["PHARMACY"], "Health & Medical", "Pharmacy", "Pharmacy purchase"),
                rule(&["DENTAL", "DENTIST", "ORTHODONT"], "Health & Medical", "Dental", "Dental care"),
                rule(
                    &["HOSPITAL", "CLINIC", "MEDICAL", "PHYSICIAN", "URGENT CARE"],
                    "Health & Medical",
                    "Doctor Visits",
                    "Medical provider",
                ),
                rule(&["OPTOMETR", "VISION"], "Health & Medical", "Vision", "Vision care"),
            ],
        ),
        table(
            "shopping",
            vec![
                rule(&["EBAY", "ETSY"], "Shopping", "Online Shopping", "Online marketplace"),
                rule(&["ELECTRONICS"], "Shopping", "Electronics", "Electronics purchase"),
                rule(&["CLOTHING", "APPAREL"], "Shopping", "Clothing", "Clothing purchase"),
                rule(&["FURNITURE", "IKEA"], "Shopping", "Home Goods", "Home furnishing purchase"),
            ],
        ),
        table(
            "dining",
            vec![
                rule(&["COFFEE", "ESPRESSO", "CAFE"], "Food & Dining", "Coffee/Tea", "Coffee shop"),
                rule(&["GROCERY", "SUPERMARKET"], "Food & Dining", "Groceries", "Grocery store"),
                rule(
                    &["RESTAURANT", "DINER", "BISTRO", "GRILL", "PIZZA", "TAVERN", "TAQUERIA", "SUSHI"],
                    "Food & Dining",
                    "Restaurants",
                    "Restaurant",
                ),
                rule(&["LIQUOR", "WINE", "BREWING"], "Food & Dining", "Alcohol", "Alcohol purchase"),
            ],
        ),
        table(
            "entertainment",
            vec![
                rule(&["SUBSCRIPTION"], "Entertainment", "Subscriptions", "Subscription service"),
                rule(&["CINEMA", "THEATER", "THEATRE"], "Entertainment", "Movies", "Movie theater"),
                rule(&["TICKETMASTER", "STUBHUB"], "Entertainment", "Concerts/Events", "Event tickets"),
                rule(&["GYM", "FITNESS", "GOLF"], "Entertainment", "Sports", "Sports and fitness"),
            ],
        ),
    ]
}
