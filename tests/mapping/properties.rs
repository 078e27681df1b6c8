//! Property-based codec checks

use crate::common::*;
use entitymap::{from_entity, to_entity};
use proptest::prelude::*;

fn phone_strategy() -> impl Strategy<Value = Phone> {
    ("[a-z]{0,6}", "[0-9]{1,8}").prop_map(|(label, number)| Phone { label, number })
}

proptest! {
    #[test]
    fn codec_round_trips_arbitrary_people(
        id in 1i64..1_000_000,
        name in "\\PC{0,24}",
        age in any::<i32>(),
        active in any::<bool>(),
        height in -1.0e6f64..1.0e6,
        avatar in proptest::collection::vec(any::<u8>(), 0..32),
        nickname in proptest::option::of("[a-z]{1,10}"),
        scores in proptest::collection::vec(any::<i64>(), 0..8),
        aliases in proptest::collection::vec(proptest::option::of("[a-z]{0,4}"), 0..5),
        phones in proptest::collection::vec(phone_strategy(), 0..5),
        street in "[A-Za-z ]{0,12}",
        visits in any::<i64>(),
    ) {
        let mut person = sample_person(id);
        person.name = name;
        person.age = age;
        person.active = active;
        person.height = height;
        person.avatar = Blob(avatar);
        person.nickname = nickname;
        person.scores = scores;
        person.aliases = aliases;
        person.phones = phones;
        person.address.street = street;
        person.visits = visits;

        let entity = to_entity(&person).unwrap();
        let decoded: Person = from_entity(entity).unwrap();
        prop_assert_eq!(decoded, person);
    }

    #[test]
    fn flattened_lists_always_share_one_length(
        phones in proptest::collection::vec(phone_strategy(), 0..10),
    ) {
        let mut person = sample_person(1);
        let expected = phones.len();
        person.phones = phones;

        let entity = to_entity(&person).unwrap();
        for name in ["phones.label", "phones.number"] {
            let len = entity
                .value(name)
                .and_then(|v| v.as_array())
                .map(|items| items.len());
            prop_assert_eq!(len, Some(expected));
        }
    }
}
