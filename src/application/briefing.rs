//! Morning briefing assembly: yesterday's record plus an AI plan suggestion,
//! gathered for the main window before the day's first interval.

use crate::application::summaries::generate_morning_plan_suggestion;
use crate::domain::models::DayRecord;
use crate::infrastructure::ai_client::TextGenerator;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::store::{FileStore, today_date_string, yesterday_date_string};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MorningBriefingContext {
    pub date: String,
    pub yesterday: Option<DayRecord>,
    pub plan_suggestion: String,
}

pub async fn prepare_morning_briefing(
    store: &FileStore,
    generator: &dyn TextGenerator,
) -> Result<MorningBriefingContext, InfraError> {
    let yesterday = store.get_day_record(&yesterday_date_string());
    let plan_suggestion = generate_morning_plan_suggestion(generator, yesterday.as_ref()).await;

    Ok(MorningBriefingContext {
        date: today_date_string(),
        yesterday,
        plan_suggestion,
    })
}
