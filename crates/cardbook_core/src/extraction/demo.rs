//! Demo-mode extractor returning fixed sample cards.

use super::{ExtractionResult, Extractor};
use crate::model::company_group::CompanyGroup;
use crate::model::person::Person;

/// Extractor used when demo mode is enabled; ignores the image.
#[derive(Debug, Clone, Copy, Default)]
pub struct DemoExtractor;

impl Extractor for DemoExtractor {
    fn process(&self, _image_data: &str) -> ExtractionResult<Vec<CompanyGroup>> {
        Ok(sample_groups())
    }
}

fn sample_person(name: &str, title: &str, phone: &str, email: &str, address: &str) -> Person {
    let mut person = Person::new(name).with_phones([phone]);
    person.title = title.to_string();
    person.email = email.to_string();
    person.address = address.to_string();
    person
}

fn sample_groups() -> Vec<CompanyGroup> {
    vec![
        CompanyGroup::with_people(
            "Google DeepMind",
            vec![
                sample_person(
                    "Demis Hassabis",
                    "CEO",
                    "+44 20 7031 3000",
                    "demis@deepmind.com",
                    "King's Cross, London",
                ),
                sample_person(
                    "Shane Gu",
                    "Research Scientist",
                    "+1 650 253 0000",
                    "shanegu@google.com",
                    "Mountain View, CA",
                ),
            ],
        ),
        CompanyGroup::with_people(
            "OpenAI",
            vec![sample_person(
                "Sam Altman",
                "CEO",
                "+1 415 555 0123",
                "sam@openai.com",
                "San Francisco, CA",
            )],
        ),
    ]
}
