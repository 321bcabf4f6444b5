use serde::{Deserialize, Serialize};

#[derive(Deserialize, Debug)]
pub struct Fixture {
    pub users: Vec<FixtureUser>,
    #[serde(default)]
    pub donations: Vec<FixtureDonation>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct FixtureUser {
    pub fullname: String,
    pub email: String,
    pub password: String,
    pub role: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct FixtureDonation {
    /// Email of the fixture user listing the item.
    pub donor: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub condition: String,
    pub image_path: Option<String>,
}

#[derive(Serialize)]
pub struct Credentials<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDonation<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub category: &'a str,
    pub condition: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_path: Option<&'a str>,
}

impl<'a> From<&'a FixtureDonation> for NewDonation<'a> {
    fn from(donation: &'a FixtureDonation) -> Self {
        Self {
            title: &donation.title,
            description: &donation.description,
            category: &donation.category,
            condition: &donation.condition,
            image_path: donation.image_path.as_deref(),
        }
    }
}

#[derive(Deserialize)]
pub struct Session {
    pub token: String,
}

#[derive(Deserialize)]
pub struct ErrorBody {
    pub message: String,
}
